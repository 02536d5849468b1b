//! Configuration file support for imgdex
//!
//! Config file location: ~/.config/imgdex/config.toml
//!
//! Example config:
//! ```toml
//! [embedding]
//! provider = "histogram"  # histogram, remote
//! # base_url = "http://localhost:8000"  # for remote
//! # dimensions = 512  # for remote
//!
//! [search]
//! top_k = 20
//! similarity_threshold = 0.0
//!
//! [storage]
//! index_dir = ".imgdex/index"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider type: histogram, remote
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name reported by the remote service
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the remote embedding service (e.g., http://localhost:8000)
    pub base_url: Option<String>,

    /// Output dimensionality of the remote model
    pub dimensions: Option<usize>,

    /// Request timeout for the remote service, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            dimensions: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "histogram".to_string()
}

fn default_model() -> String {
    "clip-vit-b-32".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tesseract language codes
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// OCR executable
    #[serde(default = "default_ocr_binary")]
    pub binary: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            binary: default_ocr_binary(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_ocr_binary() -> String {
    "tesseract".to_string()
}

/// Search defaults and hybrid fusion weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for visual results. 0.0 keeps everything non-negative.
    #[serde(default)]
    pub similarity_threshold: f32,

    #[serde(default = "default_weight")]
    pub visual_weight: f32,

    #[serde(default = "default_weight")]
    pub text_weight: f32,

    /// Maximum snippet length (characters) in text results
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            visual_weight: default_weight(),
            text_weight: default_weight(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    20
}

fn default_weight() -> f32 {
    0.5
}

fn default_snippet_chars() -> usize {
    200
}

/// Where the index lives on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(".imgdex").join("index")
}

/// Directory scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            extensions: default_extensions(),
            include_hidden: false,
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("./sample_images")]
}

pub fn default_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Indexing resilience
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Per-image extraction timeout in seconds (0 disables)
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_extraction_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("imgdex")
            .join("config.toml")
    }

    /// Load config from the default location, returning defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, returning defaults if not found or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Create example config file if it doesn't exist
    pub fn create_example_if_missing(path: &Path, force: bool) -> anyhow::Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }

        let example = r#"# imgdex Configuration
# Location: ~/.config/imgdex/config.toml

[embedding]
# Provider: histogram (built-in colour/edge features, 160 dims) or remote
provider = "histogram"

# Remote embedding service (POST {base_url}/embed with raw image bytes)
# model = "clip-vit-b-32"
# base_url = "http://localhost:8000"
# dimensions = 512
# request_timeout_secs = 60

[ocr]
enabled = true
languages = ["eng"]
binary = "tesseract"

[search]
top_k = 20
# Visual results below this cosine similarity are dropped
similarity_threshold = 0.0
# Hybrid fusion: score = visual_weight * visual + text_weight * text
visual_weight = 0.5
text_weight = 0.5
snippet_chars = 200

[storage]
index_dir = ".imgdex/index"

[scan]
directories = ["./sample_images"]
extensions = [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
include_hidden = false

[indexing]
# Skip an image if extraction takes longer than this (0 disables)
extraction_timeout_secs = 30
"#;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, example)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.embedding.provider, "histogram");
        assert_eq!(config.search.top_k, 20);
        assert_eq!(config.search.similarity_threshold, 0.0);
        assert_eq!(config.search.visual_weight, 0.5);
        assert_eq!(config.search.text_weight, 0.5);
        assert!(config.ocr.enabled);
        assert!(config.scan.extensions.contains(&".webp".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[embedding]
provider = "remote"
base_url = "http://localhost:8000"
dimensions = 512

[search]
similarity_threshold = 0.7
visual_weight = 0.3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.embedding.provider, "remote");
        assert_eq!(config.embedding.dimensions, Some(512));
        assert_eq!(config.search.similarity_threshold, 0.7);
        assert_eq!(config.search.visual_weight, 0.3);
        // untouched fields keep their defaults
        assert_eq!(config.search.text_weight, 0.5);
        assert_eq!(config.search.top_k, 20);
        assert_eq!(config.indexing.extraction_timeout_secs, 30);
    }

    #[test]
    fn test_example_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Config::create_example_if_missing(&path, false).unwrap());
        assert!(!Config::create_example_if_missing(&path, false).unwrap());

        let config = Config::load_from(&path);
        assert_eq!(config.embedding.provider, "histogram");
        assert_eq!(config.storage.index_dir, PathBuf::from(".imgdex/index"));
    }
}
