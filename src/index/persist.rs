//! Saving and loading an [`IndexStore`] directory
//!
//! Layout (all in one directory):
//! - `images.meta.json`      header, written last
//! - `images.ids.json`       image ids; position i is row i
//! - `images.embeddings`     dense f32 matrix, one row per image
//! - `images.records.jsonl`  OCR text and metadata, line i is row i
//! - `images.inverted.json`  word postings (optional, rebuilt when absent)

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};

use super::embeddings::{EmbeddingsStore, EmbeddingsWriter};
use super::entry::IndexEntry;
use super::meta::{IndexMeta, FORMAT_VERSION};
use super::records::{read_records, ImageRecord, RecordWriter};
use super::store::{check_unit_vector, IndexStore};

pub const META_FILE: &str = "images.meta.json";
pub const IDS_FILE: &str = "images.ids.json";
pub const EMBEDDINGS_FILE: &str = "images.embeddings";
pub const RECORDS_FILE: &str = "images.records.jsonl";
pub const INVERTED_FILE: &str = "images.inverted.json";

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through a temporary file, then rename over `path`
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = tmp_path(path);
    if let Err(e) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn corrupt(what: impl Into<String>) -> IndexError {
    IndexError::CorruptIndex(what.into())
}

impl IndexStore {
    /// True if `dir` holds a saved index
    pub fn exists(dir: &Path) -> bool {
        dir.join(META_FILE).exists()
    }

    /// Persist the store into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let dimensions = self.dimensions().unwrap_or(0);

        // Rows follow the ascending image_id iteration order
        let ids: Vec<&str> = self.all_entries().map(|e| e.image_id.as_str()).collect();
        write_atomic(&dir.join(IDS_FILE), |p| {
            std::fs::write(p, serde_json::to_vec(&ids)?)?;
            Ok(())
        })?;

        write_atomic(&dir.join(EMBEDDINGS_FILE), |p| {
            let mut writer = EmbeddingsWriter::create(p, dimensions)?;
            for entry in self.all_entries() {
                writer.add(&entry.embedding)?;
            }
            writer.finish()?;
            Ok(())
        })?;

        write_atomic(&dir.join(RECORDS_FILE), |p| {
            let mut writer = RecordWriter::create(p)?;
            for entry in self.all_entries() {
                writer.add(&ImageRecord {
                    image_id: entry.image_id.clone(),
                    ocr_text: entry.ocr_text.clone(),
                    metadata: entry.metadata.clone(),
                })?;
            }
            writer.finish()?;
            Ok(())
        })?;

        let inverted: BTreeMap<&str, &BTreeSet<String>> = self
            .inverted_index()
            .iter()
            .map(|(w, ids)| (w.as_str(), ids))
            .collect();
        write_atomic(&dir.join(INVERTED_FILE), |p| {
            std::fs::write(p, serde_json::to_vec(&inverted)?)?;
            Ok(())
        })?;

        let meta = IndexMeta {
            version: FORMAT_VERSION.to_string(),
            provider: self.provider().map(|s| s.to_string()),
            dimensions,
            image_count: self.len(),
        };
        write_atomic(&dir.join(META_FILE), |p| meta.save(p))?;

        info!(
            "Saved index with {} images ({} dims, {} words) to {:?}",
            self.len(),
            dimensions,
            inverted.len(),
            dir
        );
        Ok(())
    }

    /// Load a saved index. Any disagreement between the artifacts is `CorruptIndex`.
    pub fn load(dir: &Path) -> Result<Self> {
        let meta = IndexMeta::load(&dir.join(META_FILE))?;
        for name in [IDS_FILE, EMBEDDINGS_FILE, RECORDS_FILE] {
            if !dir.join(name).exists() {
                return Err(corrupt(format!("header present but {} is missing", name)));
            }
        }

        let ids_path = dir.join(IDS_FILE);
        let ids: Vec<String> = serde_json::from_slice(&std::fs::read(&ids_path)?)
            .map_err(|e| corrupt(format!("unreadable id list {:?}: {}", ids_path, e)))?;
        let records = read_records(&dir.join(RECORDS_FILE))?;
        let matrix = EmbeddingsStore::open(&dir.join(EMBEDDINGS_FILE), meta.dimensions)?;

        if matrix.len() != records.len() {
            return Err(corrupt(format!(
                "embedding matrix has {} rows but there are {} records",
                matrix.len(),
                records.len()
            )));
        }
        if ids.len() != records.len() {
            return Err(corrupt(format!(
                "id list has {} entries but there are {} records",
                ids.len(),
                records.len()
            )));
        }
        if meta.image_count != records.len() {
            return Err(corrupt(format!(
                "header declares {} images but there are {} records",
                meta.image_count,
                records.len()
            )));
        }

        let mut entries = BTreeMap::new();
        for (row, (id, record)) in ids.into_iter().zip(records).enumerate() {
            if record.image_id != id {
                return Err(corrupt(format!(
                    "row {} is {} in the id list but {} in the records",
                    row, id, record.image_id
                )));
            }
            let embedding = matrix
                .get(row)
                .ok_or_else(|| corrupt(format!("missing embedding row {}", row)))?;
            check_unit_vector(&embedding)
                .map_err(|reason| corrupt(format!("row {} ({}): {}", row, id, reason)))?;
            let entry = IndexEntry::new(id, embedding, record.ocr_text, record.metadata);
            if let Some(dup) = entries.insert(entry.image_id.clone(), entry) {
                return Err(corrupt(format!("duplicate image id {}", dup.image_id)));
            }
        }

        let inverted = match load_inverted(&dir.join(INVERTED_FILE), &entries)? {
            Some(inverted) => inverted,
            None => {
                warn!("No inverted index in {:?}, rebuilding from records", dir);
                build_inverted(&entries)
            }
        };

        let dimensions = (!entries.is_empty()).then_some(meta.dimensions);
        info!(
            "Loaded index with {} images ({} dims, {} words) from {:?}",
            entries.len(),
            meta.dimensions,
            inverted.len(),
            dir
        );

        Ok(IndexStore::from_parts(entries, inverted, dimensions, meta.provider))
    }

    /// Load the index in `dir`, or start empty if none was saved yet
    pub fn load_or_empty(dir: &Path) -> Result<Self> {
        if Self::exists(dir) {
            Self::load(dir)
        } else {
            info!("No index found at {:?}, starting empty", dir);
            Ok(Self::new())
        }
    }
}

fn build_inverted(entries: &BTreeMap<String, IndexEntry>) -> FxHashMap<String, BTreeSet<String>> {
    let mut inverted: FxHashMap<String, BTreeSet<String>> = FxHashMap::default();
    for entry in entries.values() {
        for word in &entry.ocr_words {
            inverted
                .entry(word.clone())
                .or_default()
                .insert(entry.image_id.clone());
        }
    }
    inverted
}

/// Read persisted postings and check them against the loaded entries.
///
/// Every posting must name an entry containing that word, and the total
/// number of postings must equal the total number of entry words; together
/// these make the two sides agree exactly.
fn load_inverted(
    path: &Path,
    entries: &BTreeMap<String, IndexEntry>,
) -> Result<Option<FxHashMap<String, BTreeSet<String>>>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw: FxHashMap<String, Vec<String>> = serde_json::from_slice(&std::fs::read(path)?)
        .map_err(|e| corrupt(format!("unreadable inverted index {:?}: {}", path, e)))?;

    let mut inverted: FxHashMap<String, BTreeSet<String>> = FxHashMap::default();
    let mut postings = 0usize;
    for (word, ids) in raw {
        let count = ids.len();
        let set: BTreeSet<String> = ids.into_iter().collect();
        if set.len() != count || set.is_empty() {
            return Err(corrupt(format!("malformed postings for word {:?}", word)));
        }
        for id in &set {
            let known = entries.get(id).is_some_and(|e| e.ocr_words.contains(&word));
            if !known {
                return Err(corrupt(format!(
                    "inverted index lists {} for word {:?} but the record does not contain it",
                    id, word
                )));
            }
        }
        postings += set.len();
        inverted.insert(word, set);
    }

    let expected: usize = entries.values().map(|e| e.ocr_words.len()).sum();
    if postings != expected {
        return Err(corrupt(format!(
            "inverted index has {} postings but records contain {} words",
            postings, expected
        )));
    }

    debug!("Loaded {} inverted index words", inverted.len());
    Ok(Some(inverted))
}
