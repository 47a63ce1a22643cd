//! Indexing orchestrator: discover → chunk → explain/embed in batches → store.

use std::path::Path;
use std::time::Instant;

use codeqa_llm::LlmProvider;

use crate::chunk::Chunk;
use crate::chunker::{ChunkerConfig, chunk_code};
use crate::discovery::{DiscoveredFile, DiscoveryConfig, discover};
use crate::embedder::ChunkEmbedder;
use crate::error::{IndexError, Result};
use crate::languages::FileKind;
use crate::markdown::{DEFAULT_MAX_HEADER_DEPTH, chunk_markdown};
use crate::store::RecordStore;

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Chunks per explain/embed/write batch (default: 32).
    pub batch_size: usize,
    pub chunker: ChunkerConfig,
    pub max_header_depth: usize,
    pub discovery: DiscoveryConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            chunker: ChunkerConfig::default(),
            max_header_depth: DEFAULT_MAX_HEADER_DEPTH,
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Summary of an indexing run. Diagnostics only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Existing index was kept and nothing was written.
    pub skipped: bool,
    pub files_scanned: usize,
    pub files_chunked: usize,
    pub chunks_generated: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
    pub records_added: usize,
    /// Store size after the run.
    pub total_records: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Drives the write path for one repository.
pub struct CodeIndexer<P: LlmProvider> {
    store: RecordStore,
    embedder: ChunkEmbedder<P>,
    config: IndexerConfig,
}

impl<P: LlmProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(store: RecordStore, embedder: ChunkEmbedder<P>, config: IndexerConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Index `root` and return the store's final record count.
    ///
    /// # Errors
    ///
    /// See [`CodeIndexer::run`].
    pub async fn index_repository(&self, root: &Path, force_overwrite: bool) -> Result<u64> {
        Ok(self.run(root, force_overwrite).await?.total_records)
    }

    /// Index `root`, returning a full report.
    ///
    /// With `force_overwrite` the store is reset first. Otherwise a non-empty store is left
    /// as is and the run is skipped. Per-file and per-batch failures are logged and recorded
    /// in the report, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidRoot`] if `root` is not a directory, or a store error if
    /// the collection cannot be reset. A failed count after the batches falls back to the
    /// number of records added.
    pub async fn run(&self, root: &Path, force_overwrite: bool) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        if !root.is_dir() {
            return Err(IndexError::InvalidRoot(root.to_path_buf()));
        }
        tracing::info!(
            root = %root.display(),
            provider = self.embedder.provider_name(),
            force_overwrite,
            "indexing started"
        );

        if force_overwrite {
            tracing::info!("force overwrite, clearing existing index");
            self.store.reset().await?;
        } else if self.store.is_initialized().await {
            report.skipped = true;
            report.total_records = self.store.size().await?;
            report.duration_ms = elapsed_ms(start);
            tracing::info!(
                records = report.total_records,
                "index already populated, skipping"
            );
            return Ok(report);
        } else {
            self.store.reset().await?;
        }

        let files = discover(root, &self.config.discovery)?;
        report.files_scanned = files.len();
        tracing::info!(
            code = files.code.len(),
            documents = files.documents.len(),
            "files discovered"
        );

        let mut chunks = Vec::new();
        let code = files.code.iter().map(|(f, lang)| (f, FileKind::Code(*lang)));
        let docs = files.documents.iter().map(|f| (f, FileKind::Document));
        for (file, kind) in code.chain(docs) {
            match self.chunk_file(file, kind).await {
                Ok(file_chunks) => {
                    if !file_chunks.is_empty() {
                        report.files_chunked += 1;
                    }
                    chunks.extend(file_chunks);
                }
                Err(e) => {
                    tracing::warn!(file = %file.rel_path, "skipping file: {e}");
                    report.errors.push(format!("{}: {e}", file.rel_path));
                }
            }
        }
        report.chunks_generated = chunks.len();
        tracing::info!(
            chunks = chunks.len(),
            files = report.files_chunked,
            "chunking finished"
        );

        let batch_size = self.config.batch_size.max(1);
        let total_batches = chunks.len().div_ceil(batch_size);
        let mut remaining = chunks.into_iter();
        for batch_no in 1..=total_batches {
            let batch: Vec<Chunk> = remaining.by_ref().take(batch_size).collect();
            let len = batch.len();
            match self.write_batch(batch).await {
                Ok(added) => {
                    report.batches_written += 1;
                    report.records_added += added;
                    tracing::info!(
                        batch = batch_no,
                        of = total_batches,
                        chunks = len,
                        added,
                        "batch written"
                    );
                }
                Err(e) => {
                    report.batches_failed += 1;
                    tracing::error!(batch = batch_no, chunks = len, "batch failed, skipping: {e}");
                    report.errors.push(format!("batch {batch_no}: {e}"));
                }
            }
        }

        report.total_records = match self.store.size().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("final record count failed, reporting records added: {e}");
                report.errors.push(format!("final count: {e}"));
                u64::try_from(report.records_added).unwrap_or(u64::MAX)
            }
        };
        report.duration_ms = elapsed_ms(start);
        tracing::info!(
            added = report.records_added,
            records = report.total_records,
            failed_batches = report.batches_failed,
            elapsed_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }

    async fn write_batch(&self, batch: Vec<Chunk>) -> Result<usize> {
        let (vectors, records) = self.embedder.embed_chunks(batch).await?;
        self.store.add(vectors, records).await
    }

    async fn chunk_file(&self, file: &DiscoveredFile, kind: FileKind) -> Result<Vec<Chunk>> {
        let text = read_lossy(&file.path, &file.rel_path).await?;
        let chunks = match kind {
            FileKind::Code(lang) => chunk_code(&text, &file.rel_path, lang, &self.config.chunker)?,
            FileKind::Document => {
                chunk_markdown(&text, &file.rel_path, self.config.max_header_depth)
            }
        };
        tracing::debug!(file = %file.rel_path, chunks = chunks.len());
        Ok(chunks)
    }
}

async fn read_lossy(path: &Path, rel_path: &str) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(file = %rel_path, "not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
