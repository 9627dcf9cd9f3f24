//! Application state for the HTTP server

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::{LlmClient, ProfileStore, PromptBuilder};
use crate::ingestion::{IngestPipeline, PdfTextExtractor, WordChunker};
use crate::orchestrator::AskOrchestrator;
use crate::providers::{OpenAiChat, OpenAiEmbedder, QdrantIndex};
use crate::retrieval::RetrievalService;
use crate::storage::{CorpusStore, SqliteCorpusStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: AskOrchestrator,
    ingestion: IngestPipeline,
    store: Arc<dyn CorpusStore>,
    /// Bearer token expected on protected routes
    auth_token: String,
    started_at: Instant,
}

impl AppState {
    /// Build the real collaborators from a validated configuration
    pub fn new(config: &RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let store: Arc<dyn CorpusStore> =
            Arc::new(SqliteCorpusStore::new(&config.storage.database_path)?);
        tracing::info!("Corpus store at {}", config.storage.database_path.display());

        let embedder = Arc::new(OpenAiEmbedder::with_client(http.clone(), &config.openai));
        let chat = Arc::new(OpenAiChat::with_client(http.clone(), &config.openai));
        let index = Arc::new(QdrantIndex::with_client(http, &config.qdrant));
        tracing::info!(
            "Providers ready (chat: {}, embeddings: {}, qdrant: {})",
            chat.model(),
            config.openai.embed_model,
            config.qdrant.url
        );

        let chunker = WordChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let ingestion = IngestPipeline::new(
            store.clone(),
            Arc::new(PdfTextExtractor),
            embedder.clone(),
            index.clone(),
            chunker,
        )
        .with_embed_retry(config.openai.embed_retry());

        let orchestrator = AskOrchestrator::new(
            Arc::new(RetrievalService::new(embedder, index)),
            PromptBuilder::new(ProfileStore::from_dir(config.storage.profiles_dir.clone())),
            LlmClient::from_config(chat, &config.llm),
            config.retrieval.top_k,
        );

        Ok(Self::from_parts(
            orchestrator,
            ingestion,
            store,
            config.auth.orchestrator_token.clone(),
        ))
    }

    /// Assemble state from prebuilt collaborators
    pub fn from_parts(
        orchestrator: AskOrchestrator,
        ingestion: IngestPipeline,
        store: Arc<dyn CorpusStore>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                ingestion,
                store,
                auth_token: auth_token.into(),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn orchestrator(&self) -> &AskOrchestrator {
        &self.inner.orchestrator
    }

    pub fn ingestion(&self) -> &IngestPipeline {
        &self.inner.ingestion
    }

    pub fn store(&self) -> &Arc<dyn CorpusStore> {
        &self.inner.store
    }

    pub fn auth_token(&self) -> &str {
        &self.inner.auth_token
    }

    /// Seconds since the state was built
    pub fn uptime(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64()
    }
}
