//! File scanner - find image files under a set of directories

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::config::ScanConfig;

/// Recursive, extension-filtered, deduplicated image discovery
#[derive(Debug, Clone)]
pub struct FileScanner {
    /// Lower-cased extensions without the leading dot
    extensions: BTreeSet<String>,
    include_hidden: bool,
}

impl FileScanner {
    pub fn new(config: &ScanConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            extensions,
            include_hidden: config.include_hidden,
        }
    }

    /// True if the file extension is on the allow-list (case-insensitive)
    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }

    /// Scan files and directories, returning canonical paths in sorted order.
    ///
    /// Missing inputs are logged and skipped. The same file reached twice
    /// (overlapping directories, symlinks) is returned once.
    pub fn scan(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut found = BTreeSet::new();

        for input in inputs {
            if input.is_file() {
                if self.is_image(input) {
                    self.insert(&mut found, input);
                }
            } else if input.is_dir() {
                // every image counts, including ones a .gitignore would hide
                let walker = WalkBuilder::new(input)
                    .standard_filters(false)
                    .hidden(!self.include_hidden)
                    .follow_links(true)
                    .build();

                for entry in walker {
                    match entry {
                        Ok(entry) => {
                            let path = entry.path();
                            if path.is_file() && self.is_image(path) {
                                self.insert(&mut found, path);
                            }
                        }
                        Err(e) => warn!("Error while scanning {:?}: {}", input, e),
                    }
                }
            } else {
                warn!("Directory not found: {:?}", input);
            }
        }

        debug!("Scan found {} images", found.len());
        found.into_iter().collect()
    }

    fn insert(&self, found: &mut BTreeSet<PathBuf>, path: &Path) {
        match std::fs::canonicalize(path) {
            Ok(canonical) => {
                found.insert(canonical);
            }
            Err(e) => warn!("Skipping {:?}: {}", path, e),
        }
    }
}
