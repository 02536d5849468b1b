//! Extractor traits

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ExtractionError;

/// Produces a fixed-length, L2-normalized feature vector for an image.
///
/// Implementations must be deterministic for a fixed configuration.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name recorded in the index header (e.g. `histogram`, `remote:clip-vit-b-32`)
    fn name(&self) -> String;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Compute the embedding of one image file
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, ExtractionError>;
}

/// One recognized word and its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f32,
}

/// Text found in an image. Empty when the image has no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedText {
    pub full_text: String,
    pub words: Vec<RecognizedWord>,
}

impl ExtractedText {
    /// Build from recognized words; the full text is the words joined by spaces
    pub fn from_words(words: Vec<RecognizedWord>) -> Self {
        let full_text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { full_text, words }
    }

    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// Reads text out of an image
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_text(&self, path: &Path) -> Result<ExtractedText, ExtractionError>;
}

/// Text extractor used when OCR is disabled or unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTextExtractor;

#[async_trait]
impl TextExtractor for NoTextExtractor {
    fn name(&self) -> &str {
        "none"
    }

    async fn extract_text(&self, _path: &Path) -> Result<ExtractedText, ExtractionError> {
        Ok(ExtractedText::default())
    }
}
