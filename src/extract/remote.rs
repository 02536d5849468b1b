//! Remote embedding service provider
//!
//! Protocol: `POST {base_url}/embed` with the raw image bytes as the body;
//! the service answers `{"embedding": [f32, ...]}`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::ExtractionError;
use crate::http::{check_response, create_client};

use super::finalize_embedding;
use super::traits::EmbeddingProvider;

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Learned-model embeddings computed by an HTTP service
pub struct RemoteEmbedding {
    client: Client,
    endpoint: String,
    model_name: String,
    dimensions: usize,
}

impl RemoteEmbedding {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .context("embedding.base_url is required for the remote provider")?;
        let dimensions = config
            .dimensions
            .filter(|d| *d > 0)
            .context("embedding.dimensions is required for the remote provider")?;

        let client = create_client(Duration::from_secs(config.request_timeout_secs))?;
        let endpoint = format!("{}/embed", base_url.trim_end_matches('/'));

        info!(
            "Remote embedding provider: {} @ {} ({} dims)",
            config.model, endpoint, dimensions
        );

        Ok(Self {
            client,
            endpoint,
            model_name: config.model.clone(),
            dimensions,
        })
    }
}

fn parse_response(path: &Path, body: &[u8]) -> Result<Vec<f32>, ExtractionError> {
    let response: EmbedResponse = serde_json::from_slice(body).map_err(|e| {
        ExtractionError::Service(format!("unexpected response for {:?}: {}", path, e))
    })?;
    Ok(response.embedding)
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedding {
    fn name(&self) -> String {
        format!("remote:{}", self.model_name)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Embedding {:?} ({} bytes) via {}", path, bytes.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExtractionError::Service(e.to_string()))?;
        let response = check_response(response, "Embedding service").await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ExtractionError::Service(e.to_string()))?;

        let embedding = parse_response(path, &body)?;
        finalize_embedding(path, embedding, self.dimensions)
    }
}
