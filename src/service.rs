//! Image search service - the query interface over one shared index
//!
//! Owns the store, the search engine and the indexing coordinator for the
//! lifetime of the process. Frontends (the CLI here) only talk to this type.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::extract::{create_embedding_provider, create_text_extractor, EmbeddingProvider, TextExtractor};
use crate::index::{read_store, IndexStats, IndexStore, SharedStore};
use crate::indexer::{BuildMode, BuildSummary, IndexingCoordinator, IndexingState};
use crate::scanner::FileScanner;
use crate::search::{HybridHit, HybridWeights, SearchEngine, TextHit, VisualHit};

/// Indexing progress plus index statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub indexing: IndexingState,
    pub stats: IndexStats,
}

pub struct ImageSearchService {
    engine: SearchEngine,
    coordinator: Arc<IndexingCoordinator>,
    default_directories: Vec<PathBuf>,
}

impl ImageSearchService {
    /// Load the persisted index (or start empty) and set up the configured extractors
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let index_dir = &config.storage.index_dir;
        let store = IndexStore::load_or_empty(index_dir)?;
        info!("Index at {:?} holds {} images", index_dir, store.len());

        let embedder = create_embedding_provider(&config.embedding)?;
        let text_extractor = create_text_extractor(&config.ocr).await;

        if let (Some(indexed), Some(dims)) = (store.provider(), store.dimensions()) {
            if indexed != embedder.name() || dims != embedder.dimensions() {
                warn!(
                    "Index was built with {} ({} dims) but the configured provider is {} ({} dims); rebuild the index",
                    indexed,
                    dims,
                    embedder.name(),
                    embedder.dimensions()
                );
            }
        }

        Ok(Self::with_parts(config, store.into_shared(), embedder, text_extractor))
    }

    /// Assemble a service from explicit parts
    pub fn with_parts(
        config: &Config,
        store: SharedStore,
        embedder: Arc<dyn EmbeddingProvider>,
        text_extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let timeout = Some(Duration::from_secs(config.indexing.extraction_timeout_secs));
        let coordinator = IndexingCoordinator::new(
            store,
            embedder,
            text_extractor,
            FileScanner::new(&config.scan),
        )
        .with_index_dir(config.storage.index_dir.clone())
        .with_extraction_timeout(timeout);

        Self {
            engine: SearchEngine::new(config.search.clone()),
            coordinator: Arc::new(coordinator),
            default_directories: config.scan.directories.clone(),
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    fn store(&self) -> &SharedStore {
        self.coordinator.store()
    }

    pub fn search_visual(&self, embedding: &[f32], top_k: usize, threshold: f32) -> Result<Vec<VisualHit>> {
        self.engine.visual(&read_store(self.store()), embedding, top_k, threshold)
    }

    pub fn search_text(&self, query: &str, max_results: usize) -> Result<Vec<TextHit>> {
        self.engine.text(&read_store(self.store()), query, max_results)
    }

    pub fn search_hybrid(
        &self,
        embedding: Option<&[f32]>,
        query: Option<&str>,
        top_k: usize,
        weights: Option<HybridWeights>,
    ) -> Result<Vec<HybridHit>> {
        self.engine
            .hybrid(&read_store(self.store()), embedding, query, top_k, weights)
    }

    /// Embed a query image with the configured provider
    pub async fn embed_query_image(&self, path: &Path) -> Result<Vec<f32>> {
        if !path.is_file() {
            return Err(IndexError::NotFound(path.display().to_string()));
        }
        Ok(self.coordinator.embedder().embed_image(path).await?)
    }

    /// Visual search using an image file as the query
    pub async fn search_by_image(&self, path: &Path, top_k: usize, threshold: f32) -> Result<Vec<VisualHit>> {
        let embedding = self.embed_query_image(path).await?;
        self.search_visual(&embedding, top_k, threshold)
    }

    pub fn get_status(&self) -> StatusReport {
        StatusReport {
            indexing: self.coordinator.status(),
            stats: read_store(self.store()).stats(),
        }
    }

    /// Directories indexed when a build names none
    pub fn resolve_directories(&self, directories: &[PathBuf]) -> Vec<PathBuf> {
        if directories.is_empty() {
            self.default_directories.clone()
        } else {
            directories.to_vec()
        }
    }

    pub async fn build_index(&self, directories: &[PathBuf]) -> Result<BuildSummary> {
        let dirs = self.resolve_directories(directories);
        self.coordinator.build_index(&dirs).await
    }

    pub async fn rebuild_index(&self, directories: &[PathBuf]) -> Result<BuildSummary> {
        let dirs = self.resolve_directories(directories);
        self.coordinator.rebuild_index(&dirs).await
    }

    /// Run a build in the background; poll [`ImageSearchService::get_status`] for progress
    pub fn start_build(
        &self,
        directories: &[PathBuf],
        mode: BuildMode,
    ) -> Result<JoinHandle<Result<BuildSummary>>> {
        let dirs = self.resolve_directories(directories);
        self.coordinator.start_build(dirs, mode)
    }
}
