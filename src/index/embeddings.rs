//! Embedding matrix storage - memory-mapped little-endian f32 rows
//!
//! Row i holds the embedding of the i-th image in the persisted id list.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{IndexError, Result};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Read-only view over a persisted embedding matrix
pub struct EmbeddingsStore {
    mmap: Option<Mmap>,
    dimensions: usize,
    count: usize,
}

impl EmbeddingsStore {
    /// Open an existing embeddings file.
    ///
    /// A file whose size is not a whole number of rows is rejected as corrupt.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;

        if len == 0 {
            return Ok(Self {
                mmap: None,
                dimensions,
                count: 0,
            });
        }

        if dimensions == 0 {
            return Err(IndexError::CorruptIndex(format!(
                "embedding matrix {:?} has {} bytes but the header declares 0 dimensions",
                path, len
            )));
        }

        let bytes_per_embedding = dimensions * F32_BYTES;
        if len % bytes_per_embedding != 0 {
            return Err(IndexError::CorruptIndex(format!(
                "embedding matrix {:?} has {} bytes, not a multiple of the {}-byte row size",
                path, len, bytes_per_embedding
            )));
        }

        // Safety: the file is owned by the index directory and not modified while mapped;
        // saves write a temporary file and rename it over this one.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            mmap: Some(mmap),
            dimensions,
            count: len / bytes_per_embedding,
        })
    }

    /// Get embedding for a specific row
    pub fn get(&self, idx: usize) -> Option<Vec<f32>> {
        if idx >= self.count {
            return None;
        }
        let mmap = self.mmap.as_ref()?;

        let bytes_per_embedding = self.dimensions * F32_BYTES;
        let start = idx * bytes_per_embedding;
        let row = &mmap[start..start + bytes_per_embedding];

        Some(
            row.chunks_exact(F32_BYTES)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Get number of rows
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Writer for creating embeddings storage
pub struct EmbeddingsWriter {
    writer: BufWriter<File>,
    dimensions: usize,
    count: usize,
}

impl EmbeddingsWriter {
    /// Create a new embeddings file
    pub fn create(path: &Path, dimensions: usize) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        Ok(Self {
            writer,
            dimensions,
            count: 0,
        })
    }

    /// Append one row
    pub fn add(&mut self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        for value in embedding {
            self.writer.write_all(&value.to_le_bytes())?;
        }
        self.count += 1;

        Ok(())
    }

    /// Flush and sync, returning the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.embeddings");

        let mut writer = EmbeddingsWriter::create(&path, 3).unwrap();
        writer.add(&[1.0, 0.0, 0.0]).unwrap();
        writer.add(&[0.0, 0.6, 0.8]).unwrap();
        assert!(writer.add(&[1.0]).is_err());
        assert_eq!(writer.finish().unwrap(), 2);

        let store = EmbeddingsStore::open(&path, 3).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap(), vec![0.0, 0.6, 0.8]);
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_truncated_matrix_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.embeddings");
        std::fs::write(&path, [0u8; 10]).unwrap();

        assert!(matches!(
            EmbeddingsStore::open(&path, 2),
            Err(IndexError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_empty_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.embeddings");
        EmbeddingsWriter::create(&path, 0).unwrap().finish().unwrap();

        let store = EmbeddingsStore::open(&path, 0).unwrap();
        assert!(store.is_empty());
    }
}
