//! Test-only mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Deterministic embedding: byte histogram folded into `dimensions` buckets, L2-normalized.
///
/// Identical texts map to identical vectors.
#[must_use]
pub fn mock_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let dimensions = dimensions.max(1);
    let mut vector = vec![0.0f32; dimensions];
    for (i, byte) in text.bytes().enumerate() {
        vector[(usize::from(byte) + i) % dimensions] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub dimensions: usize,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Fail any embedding request whose input contains this text.
    pub fail_embed_marker: Option<String>,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    chat_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock explanation".into(),
            dimensions: 8,
            fail_chat: false,
            fail_embed: false,
            fail_embed_marker: None,
            delay_ms: 0,
            chat_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_chat() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embed() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embed_failure_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_embed_marker = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    async fn maybe_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::Other(e.to_string()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if let Some(ref marker) = self.fail_embed_marker
            && texts.iter().any(|t| t.contains(marker.as_str()))
        {
            return Err(LlmError::Other(format!("mock embedding rejected {marker}")));
        }
        Ok(texts
            .iter()
            .map(|t| mock_embedding(t, self.dimensions))
            .collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_embedding_is_deterministic_and_normalized() {
        let a = mock_embedding("def add(a, b)", 8);
        let b = mock_embedding("def add(a, b)", 8);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mock_embedding_empty_text_is_zero_vector() {
        assert_eq!(mock_embedding("", 4), vec![0.0; 4]);
    }

    #[tokio::test]
    async fn chat_pops_scripted_responses_then_default() {
        let p = MockProvider::with_responses(vec!["first".into()]);
        assert_eq!(p.chat(&[]).await.unwrap(), "first");
        assert_eq!(p.chat(&[]).await.unwrap(), "mock explanation");
        assert_eq!(p.chat_calls(), 2);
    }

    #[tokio::test]
    async fn embed_marker_fails_matching_batches_only() {
        let p = MockProvider::default().with_embed_failure_on("POISON");
        assert!(p.embed_batch(&["ok".into()]).await.is_ok());
        assert!(p.embed_batch(&["ok".into(), "POISON".into()]).await.is_err());
        assert_eq!(p.embed_calls(), 2);
    }
}
