//! Weighted fusion of visual and text rankings

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::index::{IndexEntry, IndexStore};

use super::{by_score_then_id, snippet, text, visual, HybridHit};

/// Candidates taken from each modality, as a multiple of `top_k`
const POOL_FACTOR: usize = 5;

/// Fusion weights: `score = visual * visual_score + text * text_score`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub visual: f32,
    pub text: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            visual: 0.5,
            text: 0.5,
        }
    }
}

impl HybridWeights {
    /// Weights must be finite, non-negative and not both zero
    pub fn validate(&self) -> Result<()> {
        let ok = |w: f32| w.is_finite() && w >= 0.0;
        if !ok(self.visual) || !ok(self.text) || self.visual + self.text <= 0.0 {
            return Err(IndexError::InvalidQuery(format!(
                "invalid hybrid weights (visual {}, text {})",
                self.visual, self.text
            )));
        }
        Ok(())
    }
}

/// Text contribution for a 0-based rank position
pub(crate) fn rank_score(rank: usize) -> f32 {
    1.0 / (1.0 + rank as f32)
}

struct Candidate<'a> {
    entry: &'a IndexEntry,
    visual: Option<f32>,
    text: Option<f32>,
    matched_words: Vec<String>,
}

/// Fuse the best `top_k * POOL_FACTOR` hits of each modality.
///
/// The pools only select candidates. Every candidate is scored from the full
/// rankings, so its visual score is its real similarity (not thresholded) and
/// its text score is 0 only when it matches no query word.
pub(crate) fn fuse(
    store: &IndexStore,
    embedding: &[f32],
    query: &str,
    top_k: usize,
    weights: HybridWeights,
    snippet_chars: usize,
) -> Result<Vec<HybridHit>> {
    // validate both inputs before scoring anything
    let visual_ranked = visual::score_all(store, embedding)?;
    let text_ranked = text::rank(store, query)?;

    if top_k == 0 {
        return Ok(Vec::new());
    }
    let pool = top_k.saturating_mul(POOL_FACTOR);

    let visual_scores: FxHashMap<&str, f32> = visual_ranked
        .iter()
        .map(|(entry, score)| (entry.image_id.as_str(), *score))
        .collect();
    let text_pool: Vec<&str> = text_ranked
        .iter()
        .take(pool)
        .map(|m| m.entry.image_id.as_str())
        .collect();

    let mut text_scores: FxHashMap<&str, (f32, Vec<String>)> = FxHashMap::default();
    for (rank, m) in text_ranked.into_iter().enumerate() {
        text_scores.insert(m.entry.image_id.as_str(), (rank_score(rank), m.matched_words));
    }

    let mut candidates: BTreeMap<&str, Candidate> = BTreeMap::new();
    let pooled = visual_ranked
        .iter()
        .take(pool)
        .map(|(entry, _)| entry.image_id.as_str())
        .chain(text_pool);
    for id in pooled {
        if candidates.contains_key(id) {
            continue;
        }
        let entry = store.get(id)?;
        let (text, matched_words) = match text_scores.remove(id) {
            Some((score, words)) => (Some(score), words),
            None => (None, Vec::new()),
        };
        candidates.insert(
            id,
            Candidate {
                entry,
                visual: visual_scores.get(id).copied(),
                text,
                matched_words,
            },
        );
    }

    let mut hits: Vec<HybridHit> = candidates
        .into_values()
        .map(|c| {
            let entry = c.entry;
            let score = weights.visual * c.visual.unwrap_or(0.0) + weights.text * c.text.unwrap_or(0.0);
            HybridHit {
                image_id: entry.image_id.clone(),
                score,
                visual_score: c.visual,
                text_score: c.text,
                matched_words: c.matched_words,
                snippet: snippet(&entry.ocr_text, snippet_chars),
                metadata: entry.metadata.clone(),
            }
        })
        .collect();

    hits.sort_by(|a, b| by_score_then_id((a.score, a.image_id.as_str()), (b.score, b.image_id.as_str())));
    hits.truncate(top_k);
    Ok(hits)
}
