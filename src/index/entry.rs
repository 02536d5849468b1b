//! Indexed image entries and their file metadata

use std::collections::BTreeSet;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::tokenize::word_set;

/// File-level facts about an image, returned verbatim with search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub file_size: u64,
    /// Modification time, seconds since the unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageMetadata {
    /// Read metadata for an image on disk.
    ///
    /// Dimensions come from the image header only; they are left empty if the
    /// header cannot be parsed.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let fs_meta = std::fs::metadata(path)?;
        let modified = fs_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        let (width, height) = match image::image_dimensions(path) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(e) => {
                tracing::debug!("Could not read dimensions of {}: {}", path.display(), e);
                (None, None)
            }
        };

        Ok(Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_size: fs_meta.len(),
            modified,
            width,
            height,
        })
    }
}

/// One indexed image
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Normalized absolute path; unique key
    pub image_id: String,
    /// L2-normalized embedding
    pub embedding: Vec<f32>,
    pub ocr_text: String,
    /// Lower-cased tokens of `ocr_text`
    pub ocr_words: BTreeSet<String>,
    pub metadata: ImageMetadata,
}

impl IndexEntry {
    /// Build an entry, deriving `ocr_words` from `ocr_text`
    pub fn new(
        image_id: impl Into<String>,
        embedding: Vec<f32>,
        ocr_text: impl Into<String>,
        metadata: ImageMetadata,
    ) -> Self {
        let ocr_text = ocr_text.into();
        Self {
            image_id: image_id.into(),
            embedding,
            ocr_words: word_set(&ocr_text),
            ocr_text,
            metadata,
        }
    }
}

/// Stable identifier for an image path: the canonical absolute path
pub fn image_id_for(path: &Path) -> std::io::Result<String> {
    let canonical = std::fs::canonicalize(path)?;
    Ok(canonical.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_derives_words() {
        let entry = IndexEntry::new(
            "/img/a.png",
            vec![1.0, 0.0],
            "Hello World, hello!",
            ImageMetadata::default(),
        );
        let words: Vec<&str> = entry.ocr_words.iter().map(|s| s.as_str()).collect();
        assert_eq!(words, vec!["hello", "world"]);
    }

    #[test]
    fn test_metadata_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let meta = ImageMetadata::from_path(&path).unwrap();
        assert_eq!(meta.filename, "pixel.png");
        assert!(meta.file_size > 0);
        assert_eq!(meta.width, Some(3));
        assert_eq!(meta.height, Some(2));
        assert!(meta.modified.is_some());
    }

    #[test]
    fn test_metadata_unreadable_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let meta = ImageMetadata::from_path(&path).unwrap();
        assert_eq!(meta.file_size, 12);
        assert_eq!(meta.width, None);
    }

    #[test]
    fn test_image_id_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.png");
        std::fs::write(&path, b"x").unwrap();
        let id = image_id_for(&path).unwrap();
        assert!(Path::new(&id).is_absolute());
        assert!(id.ends_with("x.png"));
    }
}
