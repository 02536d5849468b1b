//! Index module - the image store, its persistence and text tokenization

mod embeddings;
mod entry;
mod meta;
mod persist;
mod records;
mod store;
mod tokenize;
mod vector;

pub use embeddings::{EmbeddingsStore, EmbeddingsWriter};
pub use entry::{image_id_for, ImageMetadata, IndexEntry};
pub use meta::{IndexMeta, FORMAT_VERSION};
pub use persist::{EMBEDDINGS_FILE, IDS_FILE, INVERTED_FILE, META_FILE, RECORDS_FILE};
pub use records::{read_records, ImageRecord, RecordWriter};
pub use store::{read_store, write_store, IndexStats, IndexStore, SharedStore, NORM_TOLERANCE};
pub use tokenize::{normalize_phrase, tokenize, word_set};
pub use vector::{dot_product, l2_norm, l2_normalize};
