//! teologos-rag: retrieval-augmented answers for theologian personas
//!
//! Two pipelines share one passage model:
//! - ingestion: PDF text extraction, word-window chunking, batched embedding,
//!   Qdrant upsert and relational bookkeeping with rollback
//! - ask: query embedding, per-agent vector search, prompt assembly with
//!   citations, and a chat completion guarded by timeout and retry

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod orchestrator;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    ask::{AskRequest, AskResponse},
    context::{Citation, ContextItem, PageRef},
    document::{Agent, Document, Passage},
};
