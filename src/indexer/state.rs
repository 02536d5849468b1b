//! Indexing state shared between a running build and status callers

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{IndexError, Result};

/// Snapshot of the coordinator's progress
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexingState {
    pub is_indexing: bool,
    /// Images processed so far in the current build
    pub progress: usize,
    /// Images found by the scan
    pub total: usize,
    pub message: String,
    pub skipped: usize,
    /// Error of the most recent failed build; cleared when a new build starts
    pub last_error: Option<String>,
}

/// Outcome of a completed build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub indexed_count: usize,
    pub skipped_count: usize,
    pub total: usize,
}

pub(crate) type SharedState = Arc<Mutex<IndexingState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, IndexingState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive right to run a build.
///
/// Acquired by flipping `is_indexing` under the state mutex; dropping the
/// guard always returns the coordinator to idle.
pub(crate) struct BuildGuard {
    state: SharedState,
    done: bool,
}

impl BuildGuard {
    pub fn acquire(state: &SharedState) -> Result<Self> {
        let mut s = lock(state);
        if s.is_indexing {
            return Err(IndexError::AlreadyIndexing);
        }
        *s = IndexingState {
            is_indexing: true,
            message: "Starting".to_string(),
            ..Default::default()
        };
        Ok(Self {
            state: state.clone(),
            done: false,
        })
    }

    pub fn set_total(&self, total: usize) {
        let mut s = lock(&self.state);
        s.total = total;
        s.message = format!("Indexing {} images", total);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        lock(&self.state).message = message.into();
    }

    /// Record one processed image
    pub fn advance(&self, skipped: bool) {
        let mut s = lock(&self.state);
        s.progress += 1;
        if skipped {
            s.skipped += 1;
        }
        s.message = format!("Processed {}/{} images", s.progress, s.total);
    }

    pub fn finish(mut self, summary: &BuildSummary) {
        let mut s = lock(&self.state);
        s.is_indexing = false;
        s.message = format!(
            "Indexed {} images ({} skipped)",
            summary.indexed_count, summary.skipped_count
        );
        drop(s);
        self.done = true;
    }

    pub fn fail(mut self, error: &IndexError) {
        let mut s = lock(&self.state);
        s.is_indexing = false;
        s.message = "Indexing failed".to_string();
        s.last_error = Some(error.to_string());
        drop(s);
        self.done = true;
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        if !self.done {
            let mut s = lock(&self.state);
            s.is_indexing = false;
            s.message = "Indexing aborted".to_string();
            s.last_error = Some("build was interrupted before completing".to_string());
        }
    }
}
