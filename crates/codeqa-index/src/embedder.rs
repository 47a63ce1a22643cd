//! Enrichment and embedding of chunk batches.
//!
//! Every chunk gets a short generated explanation (concurrently, per chunk, with its own
//! retry budget). The batch is then embedded in a single request over text that combines
//! path, explanation and content.

use std::sync::Arc;

use codeqa_llm::{LlmProvider, Message, RetryPolicy, retry_with_backoff};

use crate::chunk::{Chunk, ChunkRecord};
use crate::error::{IndexError, Result};

/// Explanation stored when generation fails after all retries.
pub const EXPLANATION_FALLBACK: &str = "Could not generate explanation.";

const SYSTEM_PROMPT: &str = "\
You explain source code and documentation snippets for developers and for retrieval.
Describe the purpose and behavior of the snippet in two to four sentences, using the active voice.
Mention notable libraries, idioms and non-obvious decisions. Refer to line ranges when helpful.
Do not suggest improvements and do not ask follow-up questions.";

fn explanation_prompt(chunk: &Chunk) -> String {
    format!(
        "Explain the following snippet from the file '{}'.\n<CODE>\n{}\n</CODE>",
        chunk.file_path, chunk.content
    )
}

/// Text sent to the embedding service for one record.
#[must_use]
pub fn embedding_text(record: &ChunkRecord) -> String {
    let label = if record.chunk.is_code() {
        "Code"
    } else {
        "Content"
    };
    format!(
        "File: {}\nExplanation: {}\n{label}:\n{}",
        record.chunk.file_path, record.explanation, record.chunk.content
    )
}

/// Turns chunks into index-aligned `(vector, record)` pairs.
pub struct ChunkEmbedder<P: LlmProvider> {
    provider: Arc<P>,
    explanation_retry: RetryPolicy,
    embedding_retry: RetryPolicy,
}

impl<P: LlmProvider> Clone for ChunkEmbedder<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            explanation_retry: self.explanation_retry,
            embedding_retry: self.embedding_retry,
        }
    }
}

impl<P: LlmProvider> ChunkEmbedder<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            explanation_retry: RetryPolicy::explanation(),
            embedding_retry: RetryPolicy::embedding(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, explanation: RetryPolicy, embedding: RetryPolicy) -> Self {
        self.explanation_retry = explanation;
        self.embedding_retry = embedding;
        self
    }

    /// Name of the backing provider, for logs.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate an explanation, falling back to [`EXPLANATION_FALLBACK`].
    pub async fn explain(&self, chunk: &Chunk) -> String {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(explanation_prompt(chunk)),
        ];
        let result = retry_with_backoff("explain", &self.explanation_retry, || {
            self.provider.chat(&messages)
        })
        .await;
        match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => EXPLANATION_FALLBACK.to_owned(),
            Err(e) => {
                tracing::warn!(
                    file = %chunk.file_path,
                    chunk = %chunk.chunk_id,
                    "explanation failed: {e}"
                );
                EXPLANATION_FALLBACK.to_owned()
            }
        }
    }

    /// Embed texts in one request, retrying the whole request.
    ///
    /// # Errors
    ///
    /// Returns the last provider error once retries are exhausted, or
    /// [`IndexError::Validation`] if the service returns the wrong number of vectors.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = retry_with_backoff("embed", &self.embedding_retry, || {
            self.provider.embed_batch(texts)
        })
        .await?;
        if vectors.len() != texts.len() {
            return Err(IndexError::Validation(format!(
                "embedding service returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// Explain every chunk concurrently, then embed the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails. Explanation failures never fail the batch.
    pub async fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
    ) -> Result<(Vec<Vec<f32>>, Vec<ChunkRecord>)> {
        if chunks.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let explanations = futures::future::join_all(chunks.iter().map(|c| self.explain(c))).await;
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(explanations)
            .map(|(chunk, explanation)| ChunkRecord { chunk, explanation })
            .collect();

        let texts: Vec<String> = records.iter().map(embedding_text).collect();
        let vectors = self.embed_texts(&texts).await?;
        Ok((vectors, records))
    }

    /// Embed a free-text question as a single-item batch.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the service returns no vector.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Validation("no embedding returned for query".into()))
    }
}
