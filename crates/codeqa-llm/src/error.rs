#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding count mismatch: sent {sent} texts, received {received} vectors")]
    EmbeddingCount { sent: usize, received: usize },

    #[error("{0}")]
    Other(String),
}
