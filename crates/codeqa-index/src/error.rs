//! Error types for codeqa-index.

use std::path::PathBuf;

/// Errors that can occur during chunking, indexing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation or embedding service error.
    #[error("LLM error: {0}")]
    Llm(#[from] codeqa_llm::LlmError),

    /// Vector database error.
    #[error("vector store error: {0}")]
    VectorStore(#[from] codeqa_memory::VectorStoreError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tree-sitter parsing error.
    #[error("parse failed: {0}")]
    Parse(String),

    /// No grammar is compiled in for the file's language.
    #[error("unsupported language")]
    UnsupportedLanguage,

    /// Repository root is missing or not a directory.
    #[error("invalid repository root: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// Caller-supplied data is inconsistent.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
