//! Image record storage - JSONL, one record per embedding row

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

use super::entry::ImageMetadata;

/// Persisted per-image data that is not part of the embedding matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: String,
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub metadata: ImageMetadata,
}

/// Read every record in file order.
///
/// Blank lines are ignored; a line that does not parse makes the index corrupt.
pub fn read_records(path: &Path) -> Result<Vec<ImageRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ImageRecord = serde_json::from_str(&line).map_err(|e| {
            IndexError::CorruptIndex(format!("record {} in {:?}: {}", line_no + 1, path, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Writer for creating a record file
pub struct RecordWriter {
    writer: BufWriter<File>,
    count: usize,
}

impl RecordWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            count: 0,
        })
    }

    /// Add a record to the store
    pub fn add(&mut self, record: &ImageRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Flush and sync, returning the number of records written
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
    fn test_records_preserve_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.records.jsonl");

        let records: Vec<ImageRecord> = ["b", "a", "c"]
            .iter()
            .map(|id| ImageRecord {
                image_id: id.to_string(),
                ocr_text: format!("text of {}", id),
                metadata: ImageMetadata::default(),
            })
            .collect();

        let mut writer = RecordWriter::create(&path).unwrap();
        for r in &records {
            writer.add(r).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 3);

        assert_eq!(read_records(&path).unwrap(), records);
    }

    #[test]
    fn test_bad_line_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.records.jsonl");
        std::fs::write(&path, "{\"image_id\":\"a\"}\nnot json\n").unwrap();

        match read_records(&path) {
            Err(IndexError::CorruptIndex(msg)) => assert!(msg.contains("record 2")),
            other => panic!("expected CorruptIndex, got {:?}", other),
        }
    }
}
