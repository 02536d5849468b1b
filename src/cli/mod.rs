//! CLI module - command definitions and handlers

mod build;
mod config_cmd;
mod search;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use imgdex::config::Config;

pub use build::BuildArgs;
pub use config_cmd::ConfigArgs;
pub use search::SearchArgs;
pub use status::StatusArgs;

/// imgdex - visual, text and hybrid search over local images
#[derive(Parser)]
#[command(name = "imgdex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/imgdex/config.toml)
    #[arg(long, global = true, env = "IMGDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Index directory, overriding [storage].index_dir
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index images from directories
    Build(BuildArgs),

    /// Search the index by image, by text, or both
    Search(SearchArgs),

    /// Show indexing state and index statistics
    Status(StatusArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

impl Cli {
    /// Effective configuration: file (explicit or default location) plus global overrides
    fn load_config(&self) -> Config {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        };
        if let Some(dir) = &self.index_dir {
            config.storage.index_dir = dir.clone();
        }
        config
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.load_config();
        match self.command {
            Commands::Build(args) => build::run(args, config, self.quiet).await,
            Commands::Search(args) => search::run(args, config).await,
            Commands::Status(args) => status::run(args, config).await,
            Commands::Config(args) => config_cmd::run(args, config, self.config).await,
        }
    }
}
