//! Relational store for agents, documents and passage records

pub mod database;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Agent, Document, NewDocument, Passage};

pub use database::SqliteCorpusStore;

/// Trait for the relational corpus store
///
/// Implementations:
/// - `SqliteCorpusStore`: SQLite via rusqlite
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn find_agent(&self, slug: &str) -> Result<Option<Agent>>;

    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Insert a document row with a fresh id and timestamp
    async fn create_document(&self, document: NewDocument) -> Result<Document>;

    /// Insert passage rows in one transaction, returning the count written
    async fn insert_passages(&self, passages: Vec<Passage>) -> Result<usize>;

    async fn delete_passages(&self, document_id: Uuid) -> Result<usize>;

    /// Delete a document and its passages. Returns false if it did not exist.
    async fn delete_document(&self, document_id: Uuid) -> Result<bool>;

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>>;

    /// Documents for an agent, newest first, with passage counts
    async fn list_documents(&self, agent_slug: &str) -> Result<Vec<Document>>;
}
