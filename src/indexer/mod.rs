//! Indexing coordinator - scan, extract, upsert, persist
//!
//! One build runs at a time. Searches keep running during a build: merge
//! builds take the store's write lock once per image, rebuilds work on a
//! private store and swap it in at the end.

mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{ExtractionError, IndexError, Result};
use crate::extract::{EmbeddingProvider, TextExtractor};
use crate::index::{image_id_for, read_store, write_store, ImageMetadata, IndexEntry, IndexStore, SharedStore};
use crate::scanner::FileScanner;

pub use state::{BuildSummary, IndexingState};

use state::{lock, BuildGuard, SharedState};

/// How a build treats the existing index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Upsert into the live store; images not seen in this scan stay
    #[default]
    Merge,
    /// Build a fresh store and replace the live one when done
    Rebuild,
}

pub struct IndexingCoordinator {
    store: SharedStore,
    embedder: Arc<dyn EmbeddingProvider>,
    text_extractor: Arc<dyn TextExtractor>,
    scanner: FileScanner,
    /// Where completed builds are saved; `None` keeps the index in memory only
    index_dir: Option<PathBuf>,
    extraction_timeout: Option<Duration>,
    state: SharedState,
}

impl IndexingCoordinator {
    pub fn new(
        store: SharedStore,
        embedder: Arc<dyn EmbeddingProvider>,
        text_extractor: Arc<dyn TextExtractor>,
        scanner: FileScanner,
    ) -> Self {
        Self {
            store,
            embedder,
            text_extractor,
            scanner,
            index_dir: None,
            extraction_timeout: None,
            state: SharedState::default(),
        }
    }

    /// Persist the store to `dir` after every completed build
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Skip an image whose extraction takes longer than `timeout`
    pub fn with_extraction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extraction_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Current progress snapshot
    pub fn status(&self) -> IndexingState {
        lock(&self.state).clone()
    }

    pub fn is_indexing(&self) -> bool {
        lock(&self.state).is_indexing
    }

    /// Index every image under `inputs` into the live store and wait for completion
    pub async fn build_index(&self, inputs: &[PathBuf]) -> Result<BuildSummary> {
        let guard = BuildGuard::acquire(&self.state)?;
        self.run(guard, inputs, BuildMode::Merge).await
    }

    /// Replace the index with the images under `inputs`
    pub async fn rebuild_index(&self, inputs: &[PathBuf]) -> Result<BuildSummary> {
        let guard = BuildGuard::acquire(&self.state)?;
        self.run(guard, inputs, BuildMode::Rebuild).await
    }

    /// Start a build on a background task.
    ///
    /// Fails with `AlreadyIndexing` before spawning if a build is running;
    /// progress is visible through [`IndexingCoordinator::status`].
    pub fn start_build(
        self: &Arc<Self>,
        inputs: Vec<PathBuf>,
        mode: BuildMode,
    ) -> Result<JoinHandle<Result<BuildSummary>>> {
        let guard = BuildGuard::acquire(&self.state)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run(guard, &inputs, mode).await }))
    }

    async fn run(&self, guard: BuildGuard, inputs: &[PathBuf], mode: BuildMode) -> Result<BuildSummary> {
        info!("Starting {:?} build over {} inputs", mode, inputs.len());
        let result = self.build(&guard, inputs, mode).await;
        match &result {
            Ok(summary) => {
                info!(
                    "Build finished: {} indexed, {} skipped of {}",
                    summary.indexed_count, summary.skipped_count, summary.total
                );
                guard.finish(summary);
            }
            Err(e) => {
                warn!("Build failed: {}", e);
                guard.fail(e);
            }
        }
        result
    }

    async fn build(&self, guard: &BuildGuard, inputs: &[PathBuf], mode: BuildMode) -> Result<BuildSummary> {
        guard.set_message("Scanning for images");
        let scanner = self.scanner.clone();
        let owned = inputs.to_vec();
        let paths = tokio::task::spawn_blocking(move || scanner.scan(&owned))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e)))?;
        guard.set_total(paths.len());
        info!("Found {} images to index", paths.len());

        let mut fresh = match mode {
            BuildMode::Merge => None,
            BuildMode::Rebuild => Some(IndexStore::new()),
        };

        // the live store takes the provider name only once one of its vectors is accepted
        let provider = self.embedder.name();
        if let Some(store) = fresh.as_mut() {
            store.set_provider(provider.as_str());
        }

        let mut indexed = 0;
        let mut skipped = 0;
        for path in &paths {
            let ok = match self.extract(path).await {
                Ok(entry) => {
                    let result = match fresh.as_mut() {
                        Some(store) => store.upsert(entry),
                        None => {
                            let mut store = write_store(&self.store);
                            store
                                .upsert(entry)
                                .map(|()| store.set_provider(provider.as_str()))
                        }
                    };
                    match result {
                        Ok(()) => true,
                        Err(IndexError::InvalidEmbedding { image_id, reason }) => {
                            warn!("Skipping {}: {}", image_id, reason);
                            false
                        }
                        // a dimension mismatch would repeat for every image
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", path, e);
                    false
                }
            };
            if ok {
                indexed += 1;
            } else {
                skipped += 1;
            }
            guard.advance(!ok);
        }

        guard.set_message("Saving index");
        match fresh {
            Some(store) => {
                self.save(&store)?;
                *write_store(&self.store) = store;
            }
            None => self.save(&read_store(&self.store))?,
        }

        Ok(BuildSummary {
            indexed_count: indexed,
            skipped_count: skipped,
            total: paths.len(),
        })
    }

    fn save(&self, store: &IndexStore) -> Result<()> {
        match &self.index_dir {
            Some(dir) => store.save(dir),
            None => Ok(()),
        }
    }

    /// Run both extractors on one image, bounded by the extraction timeout
    async fn extract(&self, path: &Path) -> std::result::Result<IndexEntry, ExtractionError> {
        let work = async {
            let (embedding, text) = tokio::try_join!(
                self.embedder.embed_image(path),
                self.text_extractor.extract_text(path),
            )?;
            let io_err = |source| ExtractionError::Io {
                path: path.to_path_buf(),
                source,
            };
            let image_id = image_id_for(path).map_err(io_err)?;
            let metadata = ImageMetadata::from_path(path).map_err(io_err)?;
            Ok::<_, ExtractionError>(IndexEntry::new(image_id, embedding, text.full_text, metadata))
        };

        match self.extraction_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| ExtractionError::Timeout {
                    path: path.to_path_buf(),
                    secs: limit.as_secs(),
                })?,
            None => work.await,
        }
    }
}
