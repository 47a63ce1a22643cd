use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(v) = raw.trim().parse() {
        Some(v)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODEQA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_CHAT_MODEL") {
            self.llm.chat_model = v;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("CODEQA_LLM_API_KEY")
            && !v.is_empty()
        {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = parsed("CODEQA_LLM_MAX_TOKENS") {
            self.llm.max_tokens = v;
        }
        if let Ok(v) = std::env::var("CODEQA_STORE_BACKEND") {
            match v.parse() {
                Ok(backend) => self.store.backend = backend,
                Err(e) => tracing::warn!("ignoring CODEQA_STORE_BACKEND: {e}"),
            }
        }
        if let Ok(v) = std::env::var("CODEQA_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("CODEQA_COLLECTION") {
            self.store.collection = v;
        }
        if let Some(v) = parsed("CODEQA_VECTOR_SIZE") {
            self.store.vector_size = v;
        }
        if let Some(v) = parsed("CODEQA_INDEX_BATCH_SIZE") {
            self.index.batch_size = v;
        }
        if let Some(v) = parsed("CODEQA_INDEX_MIN_CHUNK_LINES") {
            self.index.min_chunk_lines = v;
        }
        if let Some(v) = parsed("CODEQA_INDEX_MAX_CHUNK_CHARS") {
            self.index.max_chunk_chars = v;
        }
        if let Some(v) = parsed("CODEQA_INDEX_MAX_HEADER_DEPTH") {
            self.index.max_header_depth = v;
        }
        if let Ok(v) = std::env::var("CODEQA_INDEX_IGNORE_PATTERNS") {
            self.index.ignore_patterns = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(v) = parsed("CODEQA_INDEX_RESPECT_GITIGNORE") {
            self.index.respect_gitignore = v;
        }
        if let Some(v) = parsed("CODEQA_RETRY_EXPLANATION_ATTEMPTS") {
            self.retry.explanation_attempts = v;
        }
        if let Some(v) = parsed("CODEQA_RETRY_EMBEDDING_ATTEMPTS") {
            self.retry.embedding_attempts = v;
        }
        if let Some(v) = parsed("CODEQA_RETRY_MIN_BACKOFF_SECS") {
            self.retry.min_backoff_secs = v;
        }
        if let Some(v) = parsed("CODEQA_RETRY_MAX_BACKOFF_SECS") {
            self.retry.max_backoff_secs = v;
        }
        if let Some(v) = parsed("CODEQA_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = v;
        }
    }
}
