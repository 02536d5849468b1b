//! Index header stored alongside the index files

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Current on-disk format version
pub const FORMAT_VERSION: &str = "1.0";

/// Header written last on save and read first on load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Metadata format version
    pub version: String,

    /// Embedding provider that produced the vectors (histogram, remote:<model>)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Embedding dimensions (0 for an empty index)
    pub dimensions: usize,

    /// Total number of indexed images
    pub image_count: usize,
}

impl IndexMeta {
    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let meta: IndexMeta = serde_json::from_str(&content)
            .map_err(|e| IndexError::CorruptIndex(format!("unreadable header {:?}: {}", path, e)))?;
        if meta.version != FORMAT_VERSION {
            return Err(IndexError::CorruptIndex(format!(
                "unsupported index version {} (expected {})",
                meta.version, FORMAT_VERSION
            )));
        }
        Ok(meta)
    }

    /// Save metadata to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_roundtrip_and_version_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.meta.json");
        let meta = IndexMeta {
            version: FORMAT_VERSION.to_string(),
            provider: Some("histogram".to_string()),
            dimensions: 160,
            image_count: 3,
        };
        meta.save(&path).unwrap();
        assert_eq!(IndexMeta::load(&path).unwrap(), meta);

        std::fs::write(&path, r#"{"version":"9.9","dimensions":2,"image_count":0}"#).unwrap();
        assert!(matches!(IndexMeta::load(&path), Err(IndexError::CorruptIndex(_))));
    }
}
