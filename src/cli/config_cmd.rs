//! Config command - manage imgdex configuration

use std::path::PathBuf;

use clap::{Args, Subcommand};

use imgdex::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show config file path
    Path,
}

pub async fn run(args: ConfigArgs, config: Config, explicit: Option<PathBuf>) -> anyhow::Result<()> {
    let path = explicit.unwrap_or_else(Config::config_path);

    match args.command {
        ConfigCommands::Show => {
            if path.exists() {
                println!("# Config file: {}", path.display());
            } else {
                println!("# Config file: {} (not found, using defaults)", path.display());
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }

        ConfigCommands::Init { force } => {
            if !Config::create_example_if_missing(&path, force)? {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            println!("Created config file at {}", path.display());
            println!();
            println!("Set [embedding].provider = \"remote\" with base_url and dimensions");
            println!("to use a learned embedding model instead of the built-in histogram.");
        }

        ConfigCommands::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}
