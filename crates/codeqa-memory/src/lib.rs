//! Vector database boundary: collection-based add, query, delete, count and id lookup.

pub mod in_memory_store;
pub mod qdrant_ops;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
