//! Question-to-records retrieval and context rendering.

use std::fmt::Write;

use codeqa_llm::LlmProvider;

use crate::chunk::{ChunkKind, ChunkRecord};
use crate::embedder::ChunkEmbedder;
use crate::store::RecordStore;

/// Nearest-neighbor retriever over the record store.
pub struct CodeRetriever<P: LlmProvider> {
    store: RecordStore,
    embedder: ChunkEmbedder<P>,
}

impl<P: LlmProvider> CodeRetriever<P> {
    #[must_use]
    pub fn new(store: RecordStore, embedder: ChunkEmbedder<P>) -> Self {
        Self { store, embedder }
    }

    /// Up to `k` records closest to `question`, nearest first.
    ///
    /// An empty or unreachable store, and any embedding or search failure, yield an empty
    /// list: no context is a valid answerable state.
    pub async fn retrieve_relevant_chunks(&self, question: &str, k: usize) -> Vec<ChunkRecord> {
        if !self.store.is_initialized().await {
            tracing::warn!(
                collection = self.store.collection(),
                "store is empty, nothing to retrieve"
            );
            return Vec::new();
        }

        let vector = match self.embedder.embed_query(question).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("question embedding failed: {e}");
                return Vec::new();
            }
        };

        match self.store.search(vector, k).await {
            Ok(records) => {
                tracing::debug!(retrieved = records.len(), k, "retrieval finished");
                records
            }
            Err(e) => {
                tracing::warn!("vector search failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Render records as tagged items for a generation prompt.
#[must_use]
pub fn format_context(records: &[ChunkRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let chunk = &record.chunk;
        let _ = writeln!(out, "<ITEM id=\"{}\">", chunk.chunk_id);
        let _ = writeln!(out, "<FILE_PATH>{}</FILE_PATH>", chunk.file_path);
        let _ = writeln!(out, "<TYPE>{}</TYPE>", chunk.kind.tag());
        let _ = writeln!(
            out,
            "<LINES>{}-{}</LINES>",
            chunk.start_line, chunk.end_line
        );
        match &chunk.kind {
            ChunkKind::Section(section) => {
                let _ = writeln!(out, "<HEADER>{}</HEADER>", section.header);
            }
            ChunkKind::Function(unit) | ChunkKind::AsyncFunction(unit) | ChunkKind::Class(unit) => {
                let _ = writeln!(out, "<NAME>{}</NAME>", unit.name);
            }
        }
        let _ = writeln!(out, "<EXPLAIN>{}</EXPLAIN>", record.explanation);
        let _ = writeln!(out, "<CONTENT>\n{}\n</CONTENT>", chunk.content);
        out.push_str("</ITEM>\n");
    }
    out
}
