mod env;


use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use codeqa_index::IndexerConfig;
use codeqa_index::chunker::ChunkerConfig;
use codeqa_index::discovery::{DEFAULT_IGNORE_PATTERNS, DiscoveryConfig};
use codeqa_index::markdown::DEFAULT_MAX_HEADER_DEPTH;
use codeqa_llm::RetryPolicy;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Only read from `CODEQA_LLM_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_max_tokens() -> u32 {
    100
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Qdrant,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            vector_size: default_vector_size(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "code_qa_collection".into()
}

fn default_vector_size() -> u64 {
    1536
}

#[derive(Debug, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_min_chunk_lines")]
    pub min_chunk_lines: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_max_header_depth")]
    pub max_header_depth: usize,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_chunk_lines: default_min_chunk_lines(),
            max_chunk_chars: default_max_chunk_chars(),
            max_header_depth: default_max_header_depth(),
            ignore_patterns: default_ignore_patterns(),
            respect_gitignore: true,
        }
    }
}

fn default_batch_size() -> usize {
    32
}

fn default_min_chunk_lines() -> usize {
    5
}

fn default_max_chunk_chars() -> usize {
    50_000
}

fn default_max_header_depth() -> usize {
    DEFAULT_MAX_HEADER_DEPTH
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_explanation_attempts")]
    pub explanation_attempts: u32,
    #[serde(default = "default_embedding_attempts")]
    pub embedding_attempts: u32,
    #[serde(default = "default_min_backoff_secs")]
    pub min_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            explanation_attempts: default_explanation_attempts(),
            embedding_attempts: default_embedding_attempts(),
            min_backoff_secs: default_min_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_explanation_attempts() -> u32 {
    3
}

fn default_embedding_attempts() -> u32 {
    5
}

fn default_min_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be greater than zero");
        }
        if self.store.vector_size == 0 {
            bail!("store.vector_size must be greater than zero");
        }
        if self.store.collection.trim().is_empty() {
            bail!("store.collection must not be empty");
        }
        if self.retry.explanation_attempts == 0 || self.retry.embedding_attempts == 0 {
            bail!("retry attempts must be greater than zero");
        }
        if self.retry.min_backoff_secs > self.retry.max_backoff_secs {
            bail!(
                "retry.min_backoff_secs ({}) exceeds retry.max_backoff_secs ({})",
                self.retry.min_backoff_secs,
                self.retry.max_backoff_secs
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            batch_size: self.index.batch_size,
            chunker: ChunkerConfig {
                min_lines: self.index.min_chunk_lines,
                max_chars: self.index.max_chunk_chars,
            },
            max_header_depth: self.index.max_header_depth,
            discovery: DiscoveryConfig {
                ignore_patterns: self.index.ignore_patterns.clone(),
                respect_gitignore: self.index.respect_gitignore,
            },
        }
    }

    #[must_use]
    pub fn explanation_retry(&self) -> RetryPolicy {
        self.retry_policy(self.retry.explanation_attempts)
    }

    #[must_use]
    pub fn embedding_retry(&self) -> RetryPolicy {
        self.retry_policy(self.retry.embedding_attempts)
    }

    fn retry_policy(&self, attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_secs(self.retry.min_backoff_secs),
            Duration::from_secs(self.retry.max_backoff_secs),
        )
    }
}
