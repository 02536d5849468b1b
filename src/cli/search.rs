//! Search command - query the index

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use imgdex::config::Config;
use imgdex::search::{HybridHit, HybridWeights, TextHit, VisualHit};
use imgdex::service::ImageSearchService;

#[derive(Args)]
pub struct SearchArgs {
    /// Text to find in images
    pub query: Option<String>,

    /// Query image for visual similarity
    #[arg(long, short = 'i')]
    pub image: Option<PathBuf>,

    /// Number of results to return (default: [search].top_k)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Minimum visual similarity (default: [search].similarity_threshold)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Visual weight for hybrid search
    #[arg(long)]
    pub visual_weight: Option<f32>,

    /// Text weight for hybrid search
    #[arg(long)]
    pub text_weight: Option<f32>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: SearchArgs, mut config: Config) -> anyhow::Result<()> {
    // queries never read text out of images
    config.ocr.enabled = false;

    let service = ImageSearchService::open(&config).await?;
    let top_k = args.top_k.unwrap_or(config.search.top_k);
    let json = args.format == "json";

    match (&args.image, &args.query) {
        (None, None) => anyhow::bail!("Provide a text query, --image, or both"),
        (Some(image), None) => {
            let threshold = args.threshold.unwrap_or(config.search.similarity_threshold);
            let hits = service.search_by_image(image, top_k, threshold).await?;
            print_results(json, &hits, print_visual)?;
        }
        (None, Some(query)) => {
            let hits = service.search_text(query, top_k)?;
            print_results(json, &hits, print_text)?;
        }
        (Some(image), Some(query)) => {
            let defaults = service.engine().default_weights();
            let weights = HybridWeights {
                visual: args.visual_weight.unwrap_or(defaults.visual),
                text: args.text_weight.unwrap_or(defaults.text),
            };
            let embedding = service.embed_query_image(image).await?;
            let hits = service.search_hybrid(Some(&embedding), Some(query), top_k, Some(weights))?;
            print_results(json, &hits, print_hybrid)?;
        }
    }

    Ok(())
}

fn print_results<T: Serialize>(json: bool, hits: &[T], print: fn(usize, &T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No results.");
    }
    for (i, hit) in hits.iter().enumerate() {
        print(i + 1, hit);
    }
    Ok(())
}

fn print_visual(rank: usize, hit: &VisualHit) {
    println!("{}. Score: {:.4}  {}", rank, hit.score, hit.image_id);
}

fn print_text(rank: usize, hit: &TextHit) {
    let phrase = if hit.phrase_match { " (phrase)" } else { "" };
    println!("{}. {}  [{}]{}", rank, hit.image_id, hit.matched_words.join(", "), phrase);
    if !hit.snippet.is_empty() {
        println!("   {}", hit.snippet);
    }
}

fn print_hybrid(rank: usize, hit: &HybridHit) {
    let part = |s: Option<f32>| s.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
    println!(
        "{}. Score: {:.4} (visual {}, text {})  {}",
        rank,
        hit.score,
        part(hit.visual_score),
        part(hit.text_score),
        hit.image_id
    );
    if !hit.matched_words.is_empty() {
        println!("   matched: {}", hit.matched_words.join(", "));
    }
}
