//! Status command - index statistics

use clap::Args;

use imgdex::config::Config;
use imgdex::service::ImageSearchService;

#[derive(Args)]
pub struct StatusArgs {
    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: StatusArgs, mut config: Config) -> anyhow::Result<()> {
    config.ocr.enabled = false;
    let service = ImageSearchService::open(&config).await?;
    let status = service.get_status();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let stats = &status.stats;
    println!("Index: {}", config.storage.index_dir.display());
    println!("  Images: {}", stats.total_images);
    println!("  Size: {:.2} MB", stats.total_size_bytes as f64 / (1024.0 * 1024.0));
    println!("  Unique words: {}", stats.unique_words);
    if let Some(dims) = stats.dimensions {
        println!("  Dimensions: {}", dims);
    }
    if let Some(provider) = &stats.provider {
        println!("  Provider: {}", provider);
    }
    if let Some(err) = &status.indexing.last_error {
        println!("  Last error: {}", err);
    }

    Ok(())
}
