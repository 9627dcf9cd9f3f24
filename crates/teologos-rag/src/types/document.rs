//! Corpus records held by the relational store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A theologian persona with its own document corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Lowercase identifier (`aquinas`)
    pub slug: String,
    /// Display name
    pub name: String,
    /// Theological tradition
    pub tradition: String,
}

/// A source PDF ingested for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub agent_slug: String,
    pub title: String,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Passages recorded for this document
    pub passages_count: usize,
}

/// Input for creating a document row
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub agent_slug: String,
    pub title: String,
    pub source_url: Option<String>,
}

/// Relational audit record of one chunk.
///
/// The chunk text itself lives in the vector payload; only its hash is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub document_id: Uuid,
    pub agent_slug: String,
    /// 0-based position within the document
    pub ord: u32,
    pub section: Option<String>,
    pub page: Option<String>,
    /// SHA-256 hex of the trimmed text
    pub text_hash: String,
}

impl Passage {
    pub fn new(document_id: Uuid, agent_slug: impl Into<String>, ord: u32, text: &str) -> Self {
        Self {
            document_id,
            agent_slug: agent_slug.into(),
            ord,
            section: None,
            page: None,
            text_hash: hash_text(text),
        }
    }
}

/// SHA-256 hex digest of the trimmed text
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}
