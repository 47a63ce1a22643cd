//! Chunking and indexing pipeline for code question answering.
//!
//! Source files are split into function and class units with tree-sitter, Markdown files
//! into nested header sections. Units are explained and embedded in fixed-size batches and
//! written to a vector store under stable ids, then retrieved by nearest-neighbor search.

pub mod chunk;
pub mod chunker;
pub mod discovery;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod markdown;
pub mod retriever;
pub mod store;

pub use chunk::{Chunk, ChunkId, ChunkKind, ChunkRecord};
pub use error::{IndexError, Result};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use retriever::{CodeRetriever, format_context};
pub use store::RecordStore;
