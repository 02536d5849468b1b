//! imgdex - image index with visual, text and hybrid search
//!
//! The core is an in-memory [`index::IndexStore`] (persisted to a directory),
//! a stateless [`search::SearchEngine`] and an [`indexer::IndexingCoordinator`]
//! that fills the store from image directories. [`service::ImageSearchService`]
//! ties them together behind the query interface used by the CLI.

pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod index;
pub mod indexer;
pub mod scanner;
pub mod search;
pub mod service;

pub use error::{ExtractionError, IndexError, Result};
