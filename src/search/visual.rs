//! Exact linear-scan cosine ranking

use crate::error::{IndexError, Result};
use crate::index::{dot_product, l2_normalize, IndexEntry, IndexStore};

use super::by_score_then_id;

/// Score every entry against `query`, best first.
///
/// The query is normalized to unit length, so for stored unit vectors the dot
/// product is the cosine similarity. An empty store yields no scores.
pub(crate) fn score_all<'a>(
    store: &'a IndexStore,
    query: &[f32],
) -> Result<Vec<(&'a IndexEntry, f32)>> {
    let Some(expected) = store.dimensions() else {
        return Ok(Vec::new());
    };
    if query.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            got: query.len(),
        });
    }
    if query.iter().any(|x| !x.is_finite()) {
        return Err(IndexError::InvalidQuery(
            "query embedding contains non-finite values".to_string(),
        ));
    }

    let mut query = query.to_vec();
    if !l2_normalize(&mut query) {
        return Err(IndexError::InvalidQuery(
            "query embedding has zero length".to_string(),
        ));
    }

    let mut scored: Vec<(&IndexEntry, f32)> = store
        .all_entries()
        .map(|entry| (entry, dot_product(&query, &entry.embedding)))
        .collect();
    scored.sort_by(|a, b| by_score_then_id((a.1, a.0.image_id.as_str()), (b.1, b.0.image_id.as_str())));

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use crate::error::IndexError;
    use crate::index::IndexStore;
    use crate::search::fixtures::*;
    use crate::search::SearchEngine;

    #[test]
    fn test_scenario_visual() {
        let store = two_images();
        let hits = SearchEngine::default()
            .visual(&store, &[1.0, 0.0], 2, 0.0)
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].image_id, "A");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].image_id, "B");
        assert!(hits[1].score.abs() < 1e-6);
    }

    #[test]
    fn test_self_similarity_ranks_first() {
        let mut store = IndexStore::new();
        let v = |x: f32, y: f32, z: f32| {
            let n = (x * x + y * y + z * z).sqrt();
            vec![x / n, y / n, z / n]
        };
        store.upsert(entry("a", v(1.0, 0.2, 0.1), "")).unwrap();
        store.upsert(entry("b", v(0.3, 1.0, 0.5), "")).unwrap();
        store.upsert(entry("c", v(0.1, 0.4, 1.0), "")).unwrap();

        let query = store.get("b").unwrap().embedding.clone();
        let hits = SearchEngine::default().visual(&store, &query, 3, -1.0).unwrap();
        assert_eq!(hits[0].image_id, "b");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_top_k_bounds() {
        let store = two_images();
        let engine = SearchEngine::default();
        assert!(engine.visual(&store, &[1.0, 0.0], 0, 0.0).unwrap().is_empty());
        assert_eq!(engine.visual(&store, &[1.0, 0.0], 100, -1.0).unwrap().len(), 2);
    }

    #[test]
    fn test_threshold_filters() {
        let store = two_images();
        let hits = SearchEngine::default()
            .visual(&store, &[1.0, 0.0], 10, 0.5)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].image_id, "A");
    }

    #[test]
    fn test_ties_break_by_id() {
        let mut store = IndexStore::new();
        for id in ["z", "m", "a"] {
            store.upsert(entry(id, vec![1.0, 0.0], "")).unwrap();
        }
        let hits = SearchEngine::default()
            .visual(&store, &[1.0, 0.0], 3, 0.0)
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.image_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_unnormalized_query_is_scaled() {
        let store = two_images();
        let hits = SearchEngine::default()
            .visual(&store, &[3.0, 0.0], 1, 0.0)
            .unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_store_and_bad_queries() {
        let engine = SearchEngine::default();
        assert!(engine
            .visual(&IndexStore::new(), &[1.0, 0.0, 0.0], 5, 0.0)
            .unwrap()
            .is_empty());

        let store = two_images();
        assert!(matches!(
            engine.visual(&store, &[1.0, 0.0, 0.0], 5, 0.0),
            Err(IndexError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(matches!(
            engine.visual(&store, &[0.0, 0.0], 5, 0.0),
            Err(IndexError::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.visual(&store, &[1.0, 0.0], 5, f32::NAN),
            Err(IndexError::InvalidQuery(_))
        ));
    }
}
