//! In-memory collaborators shared by unit tests

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::error::{Error, ProviderError, Result};
use crate::ingestion::{normalize_whitespace, PageText, TextExtractor};
use crate::providers::{
    ChatMessage, ChatProvider, CollectionStatus, EmbeddingProvider, ScoredPoint, VectorIndex,
    VectorPoint,
};
use crate::storage::{CorpusStore, SqliteCorpusStore};
use crate::types::{Agent, Document, NewDocument, Passage};

/// Returns the same pages for every file
pub struct StaticExtractor(Vec<String>);

impl StaticExtractor {
    /// A single-page document
    pub fn new(text: &str) -> Self {
        Self(vec![text.to_string()])
    }

    /// One entry per page, numbered from 1
    pub fn paged(pages: &[&str]) -> Self {
        Self(pages.iter().map(|p| p.to_string()).collect())
    }
}

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract(&self, _filename: &str, _data: Vec<u8>) -> Result<Vec<PageText>> {
        Ok(self
            .0
            .iter()
            .zip(1u32..)
            .map(|(text, number)| PageText {
                number,
                text: normalize_whitespace(text),
            })
            .filter(|page| !page.text.is_empty())
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EmbedderMode {
    /// Letter-frequency vectors, so similar texts score close
    Letters,
    /// One empty vector per input
    Empty,
    /// Every call fails
    Fail,
    /// First call is rate limited for a few milliseconds, then `Letters`
    RateLimitedOnce,
}

pub struct StubEmbedder {
    mode: EmbedderMode,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(mode: EmbedderMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 27];
    vector[26] = 1.0;
    for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
        vector[(c as u8 - b'a') as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            EmbedderMode::Letters => Ok(texts.iter().map(|t| letter_vector(t)).collect()),
            EmbedderMode::Empty => Ok(texts.iter().map(|_| Vec::new()).collect()),
            EmbedderMode::Fail => Err(Error::embedding("provider unavailable (503)")),
            EmbedderMode::RateLimitedOnce if self.calls() == 1 => Err(Error::EmbeddingRequest(
                ProviderError::status(429, "rate limited")
                    .with_retry_after(Some(Duration::from_millis(5))),
            )),
            EmbedderMode::RateLimitedOnce => Ok(texts.iter().map(|t| letter_vector(t)).collect()),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Vector index holding points in memory, ranked by cosine similarity
#[derive(Default)]
pub struct MemoryIndex {
    collections: Mutex<HashMap<String, (usize, Vec<VectorPoint>)>>,
    deleted: Mutex<Vec<Uuid>>,
    searches: AtomicUsize,
}

impl MemoryIndex {
    pub fn points(&self, collection: &str) -> Vec<VectorPoint> {
        self.collections
            .lock()
            .get(collection)
            .map(|(_, points)| points.clone())
            .unwrap_or_default()
    }

    pub fn deleted_documents(&self) -> Vec<Uuid> {
        self.deleted.lock().clone()
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus> {
        Ok(match self.collections.lock().get(collection) {
            Some((size, _)) => CollectionStatus::Present {
                vector_size: Some(*size),
            },
            None => CollectionStatus::Missing,
        })
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
        self.collections
            .lock()
            .insert(collection.to_string(), (vector_size, Vec::new()));
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.lock().remove(collection);
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, points: &[VectorPoint]) -> Result<()> {
        let mut collections = self.collections.lock();
        let (_, stored) = collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("collection {} missing", collection)))?;
        stored.extend_from_slice(points);
        Ok(())
    }

    async fn search_collection(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let collections = self.collections.lock();
        let mut scored: Vec<(f32, &VectorPoint)> = match collections.get(collection) {
            Some((_, points)) => points.iter().map(|p| (cosine(&p.vector, vector), p)).collect(),
            None => Vec::new(),
        };
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, point)| ScoredPoint {
                score: Some(score),
                payload: match serde_json::to_value(&point.payload) {
                    Ok(Value::Object(map)) => Some(map),
                    _ => None,
                },
            })
            .collect())
    }

    async fn delete_points_by_document(&self, collection: &str, document_id: Uuid) -> Result<()> {
        self.deleted.lock().push(document_id);
        if let Some((_, points)) = self.collections.lock().get_mut(collection) {
            points.retain(|p| p.payload.doc_id != document_id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// SQLite store that records mutating calls and can be told to fail inserts
pub struct RecordingStore {
    inner: SqliteCorpusStore,
    calls: Mutex<Vec<String>>,
    fail_inserts: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteCorpusStore::in_memory().unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteCorpusStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl CorpusStore for RecordingStore {
    async fn find_agent(&self, slug: &str) -> Result<Option<Agent>> {
        self.inner.find_agent(slug).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.inner.list_agents().await
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        self.record("create_document");
        self.inner.create_document(document).await
    }

    async fn insert_passages(&self, passages: Vec<Passage>) -> Result<usize> {
        self.record("insert_passages");
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(Error::storage("disk full"));
        }
        self.inner.insert_passages(passages).await
    }

    async fn delete_passages(&self, document_id: Uuid) -> Result<usize> {
        self.record("delete_passages");
        self.inner.delete_passages(document_id).await
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<bool> {
        self.record("delete_document");
        self.inner.delete_document(document_id).await
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
        self.inner.get_document(document_id).await
    }

    async fn list_documents(&self, agent_slug: &str) -> Result<Vec<Document>> {
        self.inner.list_documents(agent_slug).await
    }
}

/// Chat provider answering with a fixed text and remembering what it saw
pub struct CountingChat {
    answer: String,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl CountingChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().clone()
    }
}

#[async_trait]
impl ChatProvider for CountingChat {
    async fn chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock() = messages.to_vec();
        Ok(self.answer.clone())
    }
}

/// A request received by a stub server
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// JSON body, `Null` when absent or not JSON
    pub body: Value,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// Answer every request with `reply` from an ephemeral local port.
/// Returns the base URL and the calls received so far.
pub async fn stub_server<F>(reply: F) -> (String, CallLog)
where
    F: Fn(&RecordedCall) -> Response + Clone + Send + Sync + 'static,
{
    let log = CallLog::default();
    let seen = log.clone();
    let router = Router::new().fallback(move |request: Request| {
        let seen = seen.clone();
        let reply = reply.clone();
        async move {
            let (parts, body) = request.into_parts();
            let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
            let call = RecordedCall {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
            };
            let response = reply(&call);
            seen.lock().push(call);
            response
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", address), log)
}
