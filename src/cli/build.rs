//! Build command - index images with a live progress bar

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use imgdex::config::Config;
use imgdex::indexer::BuildMode;
use imgdex::service::ImageSearchService;

#[derive(Args)]
pub struct BuildArgs {
    /// Image directories and/or files (default: [scan].directories)
    pub paths: Vec<PathBuf>,

    /// Replace the index with exactly these images instead of merging
    #[arg(long)]
    pub rebuild: bool,

    /// Skip OCR for this build
    #[arg(long)]
    pub no_ocr: bool,

    /// Per-image extraction timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Include hidden files and directories
    #[arg(long)]
    pub include_hidden: bool,
}

pub async fn run(args: BuildArgs, mut config: Config, quiet: bool) -> anyhow::Result<()> {
    if args.no_ocr {
        config.ocr.enabled = false;
    }
    if let Some(secs) = args.timeout {
        config.indexing.extraction_timeout_secs = secs;
    }
    if args.include_hidden {
        config.scan.include_hidden = true;
    }

    let service = ImageSearchService::open(&config).await?;
    let mode = if args.rebuild {
        BuildMode::Rebuild
    } else {
        BuildMode::Merge
    };
    let dirs = service.resolve_directories(&args.paths);
    info!("Building index at {:?} from {:?}", config.storage.index_dir, dirs);

    let handle = service.start_build(&dirs, mode)?;

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    while !handle.is_finished() {
        let state = service.get_status().indexing;
        progress.set_length(state.total as u64);
        progress.set_position(state.progress as u64);
        progress.set_message(state.message);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let summary = handle.await??;
    progress.finish_and_clear();

    let stats = service.get_status().stats;
    println!("Index built at {}", config.storage.index_dir.display());
    println!("  Indexed: {}", summary.indexed_count);
    println!("  Skipped: {}", summary.skipped_count);
    println!("  Total images in index: {}", stats.total_images);
    println!("  Unique words: {}", stats.unique_words);
    if let Some(dims) = stats.dimensions {
        println!("  Dimensions: {}", dims);
    }

    Ok(())
}
