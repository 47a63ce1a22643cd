mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codeqa_index::embedder::ChunkEmbedder;
use codeqa_index::{CodeIndexer, CodeRetriever, RecordStore, format_context};
use codeqa_llm::openai::OpenAiProvider;
use codeqa_memory::{InMemoryVectorStore, QdrantOps, VectorStore};

use crate::config::{Config, StoreBackend};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(
    name = "codeqa",
    version,
    about = "Index a code repository into a vector store and retrieve context for questions"
)]
struct Cli {
    /// Path to the TOML config (falls back to CODEQA_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, explain, embed and store a repository
    Index {
        /// Repository root
        root: PathBuf,

        /// Drop the existing index before indexing
        #[arg(long)]
        force: bool,
    },
    /// Print retrieved context for a question
    Search {
        question: String,

        /// Number of records to retrieve (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
}

/// Handles shared by every command, built once at startup.
struct App {
    config: Config,
    store: RecordStore,
    embedder: ChunkEmbedder<OpenAiProvider>,
}

impl App {
    fn build(config: Config) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let ops: Arc<dyn VectorStore> = match config.store.backend {
            StoreBackend::Qdrant => Arc::new(
                QdrantOps::new(&config.store.qdrant_url)
                    .with_context(|| format!("failed to connect to {}", config.store.qdrant_url))?,
            ),
            StoreBackend::Memory => {
                tracing::warn!("in-memory store selected, records are lost on exit");
                Arc::new(InMemoryVectorStore::new())
            }
        };
        let store = RecordStore::new(ops, config.store.collection.clone(), config.store.vector_size);

        let api_key = config.llm.api_key.clone().unwrap_or_else(|| {
            tracing::warn!("CODEQA_LLM_API_KEY is not set, sending unauthenticated requests");
            String::new()
        });
        let provider = OpenAiProvider::new(
            api_key,
            config.llm.base_url.clone(),
            config.llm.chat_model.clone(),
            config.llm.embedding_model.clone(),
            config.llm.max_tokens,
        )
        .context("failed to build LLM provider")?;
        let embedder = ChunkEmbedder::new(Arc::new(provider))
            .with_retry(config.explanation_retry(), config.embedding_retry());

        Ok(Self {
            config,
            store,
            embedder,
        })
    }

    async fn index(&self, root: &Path, force: bool) -> anyhow::Result<()> {
        let indexer = CodeIndexer::new(
            self.store.clone(),
            self.embedder.clone(),
            self.config.indexer_config(),
        );
        let report = indexer
            .run(root, force)
            .await
            .with_context(|| format!("failed to index {}", root.display()))?;

        if report.skipped {
            println!(
                "index already holds {} records, use --force to rebuild",
                report.total_records
            );
            return Ok(());
        }
        println!(
            "indexed {} files into {} chunks: {} added, {} batches written, {} failed ({} ms)",
            report.files_chunked,
            report.chunks_generated,
            report.records_added,
            report.batches_written,
            report.batches_failed,
            report.duration_ms
        );
        for error in &report.errors {
            println!("  skipped: {error}");
        }
        println!("total records: {}", report.total_records);
        Ok(())
    }

    async fn search(&self, question: &str, k: Option<usize>) -> anyhow::Result<()> {
        let retriever = CodeRetriever::new(self.store.clone(), self.embedder.clone());
        let k = k.unwrap_or(self.config.retrieval.top_k);
        let records = retriever.retrieve_relevant_chunks(question, k).await;
        if records.is_empty() {
            println!("no relevant context found");
        } else {
            print!("{}", format_context(&records));
        }
        Ok(())
    }
}

fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var_os("CODEQA_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let app = App::build(config)?;

    match cli.command {
        Command::Index { root, force } => app.index(&root, force).await,
        Command::Search { question, k } => app.search(&question, k).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_index_command() {
        let cli = Cli::try_parse_from(["codeqa", "index", "./repo", "--force"]).unwrap();
        match cli.command {
            Command::Index { root, force } => {
                assert_eq!(root, PathBuf::from("./repo"));
                assert!(force);
            }
            Command::Search { .. } => panic!("expected index"),
        }
    }

    #[test]
    fn parses_search_with_k() {
        let cli = Cli::try_parse_from([
            "codeqa",
            "--config",
            "custom.toml",
            "search",
            "where is auth?",
            "-k",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Command::Search { question, k } => {
                assert_eq!(question, "where is auth?");
                assert_eq!(k, Some(3));
            }
            Command::Index { .. } => panic!("expected search"),
        }
    }

    #[test]
    fn explicit_config_path_wins() {
        assert_eq!(
            resolve_config_path(Some(PathBuf::from("a.toml"))),
            PathBuf::from("a.toml")
        );
    }

    #[test]
    fn memory_backend_builds_without_network() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.llm.api_key = Some("test".into());
        let app = App::build(config).unwrap();
        assert_eq!(app.store.collection(), "code_qa_collection");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.index.batch_size = 0;
        assert!(App::build(config).is_err());
    }
}
