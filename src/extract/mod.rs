//! Extract module - image embeddings and OCR text

mod histogram;
mod remote;
mod tesseract;
mod traits;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{EmbeddingConfig, OcrConfig};
use crate::error::ExtractionError;
use crate::index::l2_normalize;

pub use histogram::{HistogramEmbedding, HISTOGRAM_DIMENSIONS};
pub use remote::RemoteEmbedding;
pub use tesseract::{parse_tsv, TesseractOcr};
pub use traits::{EmbeddingProvider, ExtractedText, NoTextExtractor, RecognizedWord, TextExtractor};

/// Create the embedding provider named in the configuration
pub fn create_embedding_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "histogram" => Arc::new(HistogramEmbedding::new()),
        "remote" => Arc::new(RemoteEmbedding::new(config)?),
        other => anyhow::bail!("Unknown embedding provider: {} (expected histogram or remote)", other),
    };
    info!(
        "Initialized embedding provider: {} ({} dims)",
        provider.name(),
        provider.dimensions()
    );
    Ok(provider)
}

/// Create the OCR extractor.
///
/// Falls back to [`NoTextExtractor`] when OCR is disabled or the binary cannot be run.
pub async fn create_text_extractor(config: &OcrConfig) -> Arc<dyn TextExtractor> {
    if !config.enabled {
        info!("OCR disabled");
        return Arc::new(NoTextExtractor);
    }
    let ocr = TesseractOcr::new(config);
    if ocr.is_available().await {
        info!("OCR engine: {} ({})", config.binary, config.languages.join("+"));
        Arc::new(ocr)
    } else {
        warn!(
            "OCR binary '{}' is not available; indexing without text",
            config.binary
        );
        Arc::new(NoTextExtractor)
    }
}

/// Check a provider's raw vector and scale it to unit length
pub(crate) fn finalize_embedding(
    path: &Path,
    mut embedding: Vec<f32>,
    dimensions: usize,
) -> Result<Vec<f32>, ExtractionError> {
    let bad = |reason: String| ExtractionError::BadVector {
        path: path.to_path_buf(),
        reason,
    };
    if embedding.len() != dimensions {
        return Err(bad(format!(
            "expected {} dimensions, got {}",
            dimensions,
            embedding.len()
        )));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(bad("non-finite values".to_string()));
    }
    if !l2_normalize(&mut embedding) {
        return Err(bad("zero vector".to_string()));
    }
    Ok(embedding)
}
