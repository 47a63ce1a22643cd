//! Chunk data model shared by the chunkers, the embedder and the record store.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::languages::Lang;

/// Per-file chunk identifier: a sequence number for code units, a hierarchical slug for sections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkId {
    Seq(usize),
    Slug(String),
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Slug(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub name: String,
    pub language: Lang,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub header: String,
    pub level: usize,
    /// Id of the enclosing emitted section. A lookup relation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_chunk_id: Option<String>,
}

/// Kind-specific fields, tagged by `type` in stored metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkKind {
    Function(CodeUnit),
    AsyncFunction(CodeUnit),
    Class(CodeUnit),
    Section(Section),
}

impl ChunkKind {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::AsyncFunction(_) => "async_function",
            Self::Class(_) => "class",
            Self::Section(_) => "section",
        }
    }
}

/// One retrievable unit: a contiguous run of lines from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    /// Path relative to the repository root, `/`-separated.
    pub file_path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub content: String,
    #[serde(flatten)]
    pub kind: ChunkKind,
}

impl Chunk {
    /// Record id used for deduplication across indexing runs.
    #[must_use]
    pub fn stable_id(&self) -> String {
        format!("{}_{}", self.file_path, self.chunk_id)
    }

    /// Symbol name for code units, header text for sections.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            ChunkKind::Function(u) | ChunkKind::AsyncFunction(u) | ChunkKind::Class(u) => &u.name,
            ChunkKind::Section(s) => &s.header,
        }
    }

    #[must_use]
    pub fn is_code(&self) -> bool {
        !matches!(self.kind, ChunkKind::Section(_))
    }
}

/// A chunk with its generated explanation, as persisted alongside its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub explanation: String,
}

impl ChunkRecord {
    /// Flatten into primitive-valued metadata. Null fields are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a JSON object.
    pub fn to_payload(&self) -> Result<HashMap<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect()),
            other => Err(IndexError::Validation(format!(
                "record serialized to non-object: {other}"
            ))),
        }
    }

    /// Rebuild a record from stored metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or mistyped.
    pub fn from_payload(payload: HashMap<String, serde_json::Value>) -> Result<Self> {
        let object: serde_json::Map<String, serde_json::Value> = payload.into_iter().collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}
