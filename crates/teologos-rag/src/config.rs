//! Configuration for the RAG service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::RetryPolicy;

/// Minimum length accepted for the orchestrator bearer token
pub const MIN_TOKEN_LEN: usize = 16;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// OpenAI embedding and chat configuration
    pub openai: OpenAiConfig,
    /// Qdrant vector index configuration
    pub qdrant: QdrantConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Chat completion timeout and retry
    pub llm: LlmConfig,
    /// Database and persona profile locations
    pub storage: StorageConfig,
    /// Bearer token configuration
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum PDF upload size in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 25 * 1024 * 1024, // 25MB
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL, including the version segment
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Chat completion model
    pub chat_model: String,
    /// Embedding model
    pub embed_model: String,
    /// Inputs per embedding request
    pub embed_batch_size: usize,
    /// Attempts per embedding batch during ingestion, first call included
    pub embed_max_attempts: u32,
    /// Delay before the first embedding retry when no `Retry-After` is sent
    pub embed_backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            embed_batch_size: 32,
            embed_max_attempts: 5,
            embed_backoff_ms: 1500,
        }
    }
}

impl OpenAiConfig {
    /// Retry policy for ingestion embedding batches
    pub fn embed_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.embed_max_attempts,
            Duration::from_millis(self.embed_backoff_ms),
            2.0,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Qdrant REST endpoint
    pub url: String,
    /// Optional `api-key` header value
    pub api_key: Option<String>,
    /// Points per upsert request
    pub upsert_batch_size: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://qdrant:6333".to_string(),
            api_key: None,
            upsert_batch_size: 200,
        }
    }
}

/// Chunking configuration (word counts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk
    pub chunk_size: usize,
    /// Words shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

/// Chat completion timeout and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Deadline covering every attempt of one completion
    pub request_timeout_ms: u64,
    /// Total attempts, first call included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_factor: 2.0,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory holding `<slug>.json` persona profiles
    pub profiles_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/teologos.db"),
            profiles_dir: PathBuf::from("./profiles"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared bearer token expected on `/ask` and document routes
    pub orchestrator_token: String,
}

impl RagConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Some(v) = var("OPENAI_MODEL") {
            self.openai.chat_model = v;
        }
        if let Some(v) = var("OPENAI_EMBED_MODEL") {
            self.openai.embed_model = v;
        }
        if let Some(v) = var("OPENAI_EMBED_BATCH") {
            self.openai.embed_batch_size = parse_var("OPENAI_EMBED_BATCH", &v)?;
        }
        if let Some(v) = var("OPENAI_EMBED_MAX_ATTEMPTS") {
            self.openai.embed_max_attempts = parse_var("OPENAI_EMBED_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("OPENAI_EMBED_BACKOFF_MS") {
            self.openai.embed_backoff_ms = parse_var("OPENAI_EMBED_BACKOFF_MS", &v)?;
        }
        if let Some(v) = var("QDRANT_URL") {
            self.qdrant.url = v;
        }
        if let Some(v) = var("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(v);
        }
        if let Some(v) = var("AGENT_ORCHESTRATOR_TOKEN") {
            self.auth.orchestrator_token = v;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_MS") {
            self.llm.request_timeout_ms = parse_var("REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = var("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = var("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(v);
        }
        if let Some(v) = var("PROFILES_DIR") {
            self.storage.profiles_dir = PathBuf::from(v);
        }

        Ok(())
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.orchestrator_token.len() < MIN_TOKEN_LEN {
            return Err(Error::Config(format!(
                "AGENT_ORCHESTRATOR_TOKEN must be at least {} characters",
                MIN_TOKEN_LEN
            )));
        }
        if self.chunking.chunk_size <= self.chunking.chunk_overlap {
            return Err(Error::Config(format!(
                "chunk_size ({}) must be greater than chunk_overlap ({})",
                self.chunking.chunk_size, self.chunking.chunk_overlap
            )));
        }
        if self.openai.embed_batch_size == 0 || self.qdrant.upsert_batch_size == 0 {
            return Err(Error::Config("batch sizes must be positive".to_string()));
        }
        if self.llm.request_timeout_ms == 0 || self.llm.max_attempts == 0 {
            return Err(Error::Config(
                "request timeout and attempt count must be positive".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}={}: {}", key, value, e)))
}
