//! Index store - embeddings, OCR text and the derived inverted word index

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{IndexError, Result};

use super::entry::IndexEntry;
use super::vector::l2_norm;

/// Allowed deviation from unit norm for stored embeddings
pub const NORM_TOLERANCE: f32 = 1e-3;

/// Store shared between the search path (readers) and a running build (writer)
pub type SharedStore = Arc<RwLock<IndexStore>>;

/// Shared read access. Upserts validate before mutating, so a store behind a
/// poisoned lock is still consistent and is used as-is.
pub fn read_store(store: &SharedStore) -> RwLockReadGuard<'_, IndexStore> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access for upserts and snapshot swaps
pub fn write_store(store: &SharedStore) -> RwLockWriteGuard<'_, IndexStore> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}

/// Check that a stored vector is finite and unit length within [`NORM_TOLERANCE`]
pub(crate) fn check_unit_vector(embedding: &[f32]) -> std::result::Result<(), String> {
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err("embedding contains non-finite values".to_string());
    }
    let norm = l2_norm(embedding);
    if (norm - 1.0).abs() > NORM_TOLERANCE {
        return Err(format!("embedding is not L2-normalized (norm {:.4})", norm));
    }
    Ok(())
}

/// Aggregate statistics about an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_images: usize,
    pub total_size_bytes: u64,
    pub unique_words: usize,
    pub dimensions: Option<usize>,
    pub provider: Option<String>,
}

/// In-memory image index.
///
/// Entries are keyed and iterated by ascending `image_id`. The inverted index
/// is maintained only by [`IndexStore::upsert`], so every posting has a
/// matching word in its entry and every entry word has a posting.
#[derive(Debug, Default)]
pub struct IndexStore {
    entries: BTreeMap<String, IndexEntry>,
    inverted: FxHashMap<String, BTreeSet<String>>,
    dimensions: Option<usize>,
    provider: Option<String>,
}

impl IndexStore {
    /// Create an empty store; the first upsert fixes the dimensionality
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into the shared handle used by the service and the coordinator
    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub(crate) fn from_parts(
        entries: BTreeMap<String, IndexEntry>,
        inverted: FxHashMap<String, BTreeSet<String>>,
        dimensions: Option<usize>,
        provider: Option<String>,
    ) -> Self {
        Self {
            entries,
            inverted,
            dimensions,
            provider,
        }
    }

    /// Insert an entry or replace the entry with the same `image_id`.
    ///
    /// Validation happens before any mutation: on error the store is unchanged.
    pub fn upsert(&mut self, entry: IndexEntry) -> Result<()> {
        self.validate(&entry)?;

        if self.dimensions.is_none() {
            self.dimensions = Some(entry.embedding.len());
        }

        if let Some(old) = self.entries.remove(&entry.image_id) {
            self.remove_words_for(&old);
        }
        self.add_words_for(&entry);
        self.entries.insert(entry.image_id.clone(), entry);

        Ok(())
    }

    fn validate(&self, entry: &IndexEntry) -> Result<()> {
        let got = entry.embedding.len();
        if got == 0 {
            return Err(IndexError::InvalidEmbedding {
                image_id: entry.image_id.clone(),
                reason: "embedding is empty".to_string(),
            });
        }
        if let Some(expected) = self.dimensions {
            if expected != got {
                return Err(IndexError::DimensionMismatch { expected, got });
            }
        }
        check_unit_vector(&entry.embedding).map_err(|reason| IndexError::InvalidEmbedding {
            image_id: entry.image_id.clone(),
            reason,
        })
    }

    fn remove_words_for(&mut self, old: &IndexEntry) {
        for word in &old.ocr_words {
            if let Some(postings) = self.inverted.get_mut(word) {
                postings.remove(&old.image_id);
                if postings.is_empty() {
                    self.inverted.remove(word);
                }
            }
        }
    }

    fn add_words_for(&mut self, entry: &IndexEntry) {
        for word in &entry.ocr_words {
            self.inverted
                .entry(word.clone())
                .or_default()
                .insert(entry.image_id.clone());
        }
    }

    /// Look up an entry by id
    pub fn get(&self, image_id: &str) -> Result<&IndexEntry> {
        self.entries
            .get(image_id)
            .ok_or_else(|| IndexError::NotFound(image_id.to_string()))
    }

    /// Iterate all entries in ascending `image_id` order. Each call starts a fresh pass.
    pub fn all_entries(&self) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.entries.values()
    }

    /// Image ids containing `word` (already lower-cased), in ascending order
    pub fn postings(&self, word: &str) -> Option<&BTreeSet<String>> {
        self.inverted.get(word)
    }

    pub(crate) fn inverted_index(&self) -> &FxHashMap<String, BTreeSet<String>> {
        &self.inverted
    }

    /// Embedding dimensionality, fixed by the first upsert
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Name of the embedding provider that produced the vectors
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn set_provider(&mut self, provider: impl Into<String>) {
        self.provider = Some(provider.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_images: self.entries.len(),
            total_size_bytes: self.entries.values().map(|e| e.metadata.file_size).sum(),
            unique_words: self.inverted.len(),
            dimensions: self.dimensions,
            provider: self.provider.clone(),
        }
    }

    /// Check that postings and entry word sets agree in both directions
    pub fn is_consistent(&self) -> bool {
        let forward = self.inverted.iter().all(|(word, ids)| {
            !ids.is_empty()
                && ids.iter().all(|id| {
                    self.entries
                        .get(id)
                        .is_some_and(|e| e.ocr_words.contains(word))
                })
        });
        let backward = self.entries.values().all(|e| {
            e.ocr_words.iter().all(|w| {
                self.inverted
                    .get(w)
                    .is_some_and(|ids| ids.contains(&e.image_id))
            })
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::entry::ImageMetadata;

    fn entry(id: &str, embedding: Vec<f32>, text: &str) -> IndexEntry {
        let metadata = ImageMetadata {
            filename: id.to_string(),
            file_size: 100,
            ..Default::default()
        };
        IndexEntry::new(id, embedding, text, metadata)
    }

    #[test]
    fn test_upsert_then_get_roundtrip() {
        let mut store = IndexStore::new();
        let e = vec![0.6, 0.8];
        store.upsert(entry("a", e.clone(), "hello world")).unwrap();

        let got = store.get("a").unwrap();
        assert_eq!(got.embedding, e);
        assert_eq!(got.ocr_text, "hello world");
        assert_eq!(store.dimensions(), Some(2));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_upsert_replaces_words() {
        let mut store = IndexStore::new();
        store.upsert(entry("a", vec![1.0, 0.0], "hello world")).unwrap();
        store.upsert(entry("b", vec![0.0, 1.0], "hello python")).unwrap();
        store.upsert(entry("a", vec![1.0, 0.0], "goodbye")).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.postings("world").is_none());
        assert_eq!(
            store.postings("hello").unwrap().iter().collect::<Vec<_>>(),
            vec!["b"]
        );
        assert!(store.postings("goodbye").unwrap().contains("a"));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = IndexStore::new();
        let e = entry("a", vec![1.0, 0.0], "same text");
        store.upsert(e.clone()).unwrap();
        store.upsert(e.clone()).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.postings("same").unwrap().len(), 1);
        assert_eq!(store.get("a").unwrap(), &e);
    }

    #[test]
    fn test_dimension_mismatch_does_not_mutate() {
        let mut store = IndexStore::new();
        store.upsert(entry("a", vec![1.0, 0.0], "keep")).unwrap();

        let err = store
            .upsert(entry("a", vec![1.0, 0.0, 0.0], "replace"))
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { expected: 2, got: 3 }
        ));
        assert_eq!(store.get("a").unwrap().ocr_text, "keep");
        assert!(store.postings("replace").is_none());
        assert!(store.is_consistent());
    }

    #[test]
    fn test_rejects_unnormalized_and_empty() {
        let mut store = IndexStore::new();
        let err = store.upsert(entry("a", vec![2.0, 0.0], "")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEmbedding { .. }));

        let err = store.upsert(entry("a", vec![], "")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEmbedding { .. }));

        let err = store.upsert(entry("a", vec![f32::NAN, 1.0], "")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEmbedding { .. }));

        // nothing was accepted, so the dimensionality is still open
        assert!(store.is_empty());
        assert_eq!(store.dimensions(), None);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = IndexStore::new();
        assert!(matches!(store.get("missing"), Err(IndexError::NotFound(id)) if id == "missing"));
    }

    #[test]
    fn test_all_entries_sorted_and_restartable() {
        let mut store = IndexStore::new();
        for id in ["c", "a", "b"] {
            store.upsert(entry(id, vec![1.0, 0.0], "")).unwrap();
        }
        let first: Vec<_> = store.all_entries().map(|e| e.image_id.as_str()).collect();
        let second: Vec<_> = store.all_entries().map(|e| e.image_id.as_str()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stats() {
        let mut store = IndexStore::new();
        store.set_provider("histogram");
        store.upsert(entry("a", vec![1.0, 0.0], "hello world")).unwrap();
        store.upsert(entry("b", vec![0.0, 1.0], "hello python")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_images, 2);
        assert_eq!(stats.total_size_bytes, 200);
        assert_eq!(stats.unique_words, 3);
        assert_eq!(stats.dimensions, Some(2));
        assert_eq!(stats.provider.as_deref(), Some("histogram"));
    }
}
