//! Search engine - visual, text and hybrid ranking over an [`IndexStore`]
//!
//! The engine holds only configuration; every query borrows a store, so
//! callers decide how long a read lock is held.

mod hybrid;
mod text;
mod visual;

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::{IndexError, Result};
use crate::index::{ImageMetadata, IndexStore};

pub use hybrid::HybridWeights;

/// Visual search result
#[derive(Debug, Clone, Serialize)]
pub struct VisualHit {
    pub image_id: String,
    /// Cosine similarity to the query
    pub score: f32,
    pub metadata: ImageMetadata,
}

/// Text search result
#[derive(Debug, Clone, Serialize)]
pub struct TextHit {
    pub image_id: String,
    /// Distinct query words found in the image text, in query order
    pub matched_words: Vec<String>,
    /// Whether the whole query appears as a phrase
    pub phrase_match: bool,
    pub snippet: String,
    pub metadata: ImageMetadata,
}

/// Hybrid search result
#[derive(Debug, Clone, Serialize)]
pub struct HybridHit {
    pub image_id: String,
    /// Weighted sum of the component scores
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_score: Option<f32>,
    pub matched_words: Vec<String>,
    pub snippet: String,
    pub metadata: ImageMetadata,
}

/// Stateless ranking over an index store
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Weights configured for hybrid fusion
    pub fn default_weights(&self) -> HybridWeights {
        HybridWeights {
            visual: self.config.visual_weight,
            text: self.config.text_weight,
        }
    }

    /// Rank every entry by cosine similarity to `query`
    pub fn visual(
        &self,
        store: &IndexStore,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<VisualHit>> {
        if !threshold.is_finite() {
            return Err(IndexError::InvalidQuery(format!(
                "similarity threshold must be finite, got {}",
                threshold
            )));
        }
        let scored = visual::score_all(store, query)?;
        Ok(scored
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .take(top_k)
            .map(|(entry, score)| VisualHit {
                image_id: entry.image_id.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    /// Find images whose OCR text contains the query words
    pub fn text(&self, store: &IndexStore, query: &str, max_results: usize) -> Result<Vec<TextHit>> {
        let ranked = text::rank(store, query)?;
        Ok(ranked
            .into_iter()
            .take(max_results)
            .map(|m| m.into_hit(self.config.snippet_chars))
            .collect())
    }

    /// Combine visual and text relevance.
    ///
    /// Blank inputs count as absent; with only one input present this
    /// delegates to that modality. `weights` defaults to the configured pair.
    pub fn hybrid(
        &self,
        store: &IndexStore,
        query_embedding: Option<&[f32]>,
        query_text: Option<&str>,
        top_k: usize,
        weights: Option<HybridWeights>,
    ) -> Result<Vec<HybridHit>> {
        let weights = weights.unwrap_or_else(|| self.default_weights());
        weights.validate()?;

        let embedding = query_embedding.filter(|e| !e.is_empty());
        let text = query_text.filter(|t| !t.trim().is_empty());

        match (embedding, text) {
            (None, None) => Err(IndexError::InvalidQuery(
                "hybrid search needs a query image, query text, or both".to_string(),
            )),
            (Some(embedding), None) => Ok(self
                .visual(store, embedding, top_k, self.config.similarity_threshold)?
                .into_iter()
                .map(HybridHit::from)
                .collect()),
            (None, Some(text)) => {
                let ranked = text::rank(store, text)?;
                Ok(ranked
                    .into_iter()
                    .take(top_k)
                    .enumerate()
                    .map(|(rank, m)| {
                        let score = hybrid::rank_score(rank);
                        let hit = m.into_hit(self.config.snippet_chars);
                        HybridHit {
                            image_id: hit.image_id,
                            score,
                            visual_score: None,
                            text_score: Some(score),
                            matched_words: hit.matched_words,
                            snippet: hit.snippet,
                            metadata: hit.metadata,
                        }
                    })
                    .collect())
            }
            (Some(embedding), Some(text)) => hybrid::fuse(
                store,
                embedding,
                text,
                top_k,
                weights,
                self.config.snippet_chars,
            ),
        }
    }
}

impl From<VisualHit> for HybridHit {
    fn from(hit: VisualHit) -> Self {
        Self {
            image_id: hit.image_id,
            score: hit.score,
            visual_score: Some(hit.score),
            text_score: None,
            matched_words: Vec::new(),
            snippet: String::new(),
            metadata: hit.metadata,
        }
    }
}

/// Descending score, then ascending id
pub(crate) fn by_score_then_id(a: (f32, &str), b: (f32, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

/// First `max_chars` characters of `text`, with an ellipsis when cut
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::index::{ImageMetadata, IndexEntry, IndexStore};

    pub fn entry(id: &str, embedding: Vec<f32>, text: &str) -> IndexEntry {
        let metadata = ImageMetadata {
            filename: format!("{}.png", id),
            file_size: 10,
            ..Default::default()
        };
        IndexEntry::new(id, embedding, text, metadata)
    }

    /// Two images: A = [1,0] "hello world", B = [0,1] "hello python"
    pub fn two_images() -> IndexStore {
        let mut store = IndexStore::new();
        store.upsert(entry("A", vec![1.0, 0.0], "hello world")).unwrap();
        store.upsert(entry("B", vec![0.0, 1.0], "hello python")).unwrap();
        store
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo wörld", 5), "héllo...");
        assert_eq!(snippet("short", 200), "short");
        assert_eq!(snippet("", 10), "");
    }

    #[test]
    fn test_hybrid_requires_an_input() {
        let engine = SearchEngine::default();
        let store = two_images();
        for (e, t) in [(None, None), (Some(&[] as &[f32]), Some("   "))] {
            let err = engine.hybrid(&store, e, t, 5, None).unwrap_err();
            assert!(matches!(err, IndexError::InvalidQuery(_)));
        }
    }

    #[test]
    fn test_hybrid_delegates_single_modality() {
        let engine = SearchEngine::new(SearchConfig::default());
        let store = two_images();

        let visual_only = engine.hybrid(&store, Some(&[1.0, 0.0]), None, 5, None).unwrap();
        assert_eq!(visual_only[0].image_id, "A");
        assert_eq!(visual_only[0].text_score, None);

        let text_only = engine.hybrid(&store, None, Some("python"), 5, None).unwrap();
        assert_eq!(text_only.len(), 1);
        assert_eq!(text_only[0].image_id, "B");
        assert_eq!(text_only[0].visual_score, None);
        assert_eq!(text_only[0].matched_words, vec!["python"]);
    }
}
