//! Ingestion pipeline: PDF bytes in, indexed passages out

use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::chunker::{TextChunk, WordChunker};
use super::parser::TextExtractor;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, PassagePayload, RetryPolicy, VectorIndex, VectorPoint};
use crate::storage::CorpusStore;
use crate::types::{Document, NewDocument, Passage};

/// Longest title stored
pub const MAX_TITLE_CHARS: usize = 200;
/// Shortest title accepted
pub const MIN_TITLE_CHARS: usize = 3;

/// An uploaded PDF and its metadata
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub agent_id: String,
    /// Falls back to the file name when blank
    pub title: Option<String>,
    pub filename: String,
    pub source_url: Option<String>,
    pub data: Vec<u8>,
}

/// Runs extraction, chunking, embedding, vector upsert and passage
/// persistence strictly in sequence, rolling back on any failure.
pub struct IngestPipeline {
    store: Arc<dyn CorpusStore>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunker: WordChunker,
    embed_retry: RetryPolicy,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chunker: WordChunker,
    ) -> Self {
        Self {
            store,
            extractor,
            embedder,
            index,
            chunker,
            embed_retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for each embedding batch. 429 responses wait for
    /// `Retry-After` when the provider sends one.
    pub fn with_embed_retry(mut self, policy: RetryPolicy) -> Self {
        self.embed_retry = policy;
        self
    }

    /// Ingest a PDF for an existing agent and return the stored document
    pub async fn ingest(&self, request: IngestRequest) -> Result<Document> {
        let start = Instant::now();
        let agent_slug = normalize_agent(&request.agent_id)?;
        self.require_agent(&agent_slug).await?;

        let title = resolve_title(request.title.as_deref(), &request.filename)?;
        let source_url = normalize_source_url(request.source_url.as_deref())?;

        let document = self
            .store
            .create_document(NewDocument {
                agent_slug: agent_slug.clone(),
                title,
                source_url,
            })
            .await?;

        tracing::info!(
            "Ingesting {} ({} bytes) as document {} for {}",
            request.filename,
            request.data.len(),
            document.id,
            agent_slug
        );

        let mut vectors_written = false;
        match self
            .index_document(&document, &request.filename, request.data, &mut vectors_written)
            .await
        {
            Ok(passages_count) => {
                tracing::info!(
                    "Document {} ingested: {} passages in {}ms",
                    document.id,
                    passages_count,
                    start.elapsed().as_millis()
                );
                Ok(Document {
                    passages_count,
                    ..document
                })
            }
            Err(err) => {
                tracing::error!("Ingestion of document {} failed: {}", document.id, err);
                self.rollback(&document, vectors_written).await;
                Err(err)
            }
        }
    }

    /// Steps after the document row exists. `vectors_written` is raised
    /// before the upsert starts, since earlier batches may commit.
    async fn index_document(
        &self,
        document: &Document,
        filename: &str,
        data: Vec<u8>,
        vectors_written: &mut bool,
    ) -> Result<usize> {
        let pages = self.extractor.extract(filename, data).await?;

        let chunks = self.chunker.chunk_pages(&pages);
        if chunks.is_empty() {
            return Err(Error::validation(
                "No usable passages could be extracted from the PDF",
            ));
        }
        tracing::debug!(
            "Document {} split into {} chunks over {} pages",
            document.id,
            chunks.len(),
            pages.len()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_with_retry(&texts, &self.embed_retry)
            .await?;
        let vector_size = match embeddings.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(Error::internal("Embedding provider returned no vectors")),
        };
        if embeddings.len() != chunks.len() {
            return Err(Error::internal(format!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        self.index
            .ensure_collection(&document.agent_slug, vector_size)
            .await?;

        let points = build_points(document, &chunks, embeddings);
        *vectors_written = true;
        self.index.upsert(&document.agent_slug, &points).await?;

        let passages = chunks
            .iter()
            .map(|c| Passage::new(document.id, document.agent_slug.clone(), c.ord, &c.text))
            .collect();
        self.store.insert_passages(passages).await
    }

    /// Best-effort cleanup; failures are logged, never raised
    async fn rollback(&self, document: &Document, vectors_written: bool) {
        if vectors_written {
            if let Err(e) = self
                .index
                .delete_document(&document.agent_slug, document.id)
                .await
            {
                tracing::warn!("Failed to remove vectors of document {}: {}", document.id, e);
            }
        }
        if let Err(e) = self.store.delete_passages(document.id).await {
            tracing::warn!("Failed to remove passages of document {}: {}", document.id, e);
        }
        if let Err(e) = self.store.delete_document(document.id).await {
            tracing::warn!("Failed to remove document {}: {}", document.id, e);
        }
    }

    /// Documents of an agent, newest first
    pub async fn list(&self, agent_id: &str) -> Result<Vec<Document>> {
        let agent_slug = normalize_agent(agent_id)?;
        self.require_agent(&agent_slug).await?;
        self.store.list_documents(&agent_slug).await
    }

    /// Remove a document's vectors, then its relational rows
    pub async fn remove(&self, agent_id: &str, document_id: Uuid) -> Result<()> {
        let agent_slug = normalize_agent(agent_id)?;
        let document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| d.agent_slug == agent_slug)
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

        self.index
            .delete_document(&document.agent_slug, document.id)
            .await?;
        self.store.delete_document(document.id).await?;

        tracing::info!("Document {} removed from {}", document.id, agent_slug);
        Ok(())
    }

    async fn require_agent(&self, agent_slug: &str) -> Result<()> {
        match self.store.find_agent(agent_slug).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("agent {}", agent_slug))),
        }
    }
}

fn build_points(document: &Document, chunks: &[TextChunk], embeddings: Vec<Vec<f32>>) -> Vec<VectorPoint> {
    chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, vector)| VectorPoint {
            id: Uuid::new_v4(),
            vector,
            payload: PassagePayload {
                agent_slug: document.agent_slug.clone(),
                title: document.title.clone(),
                doc_id: document.id,
                url: document.source_url.clone(),
                ord: chunk.ord,
                text: chunk.text.clone(),
                section: chunk.pages.map(|span| span.section()),
                page: chunk.pages.map(|span| span.start),
            },
        })
        .collect()
}

/// Trim and lowercase an agent identifier
pub fn normalize_agent(agent_id: &str) -> Result<String> {
    let slug = agent_id.trim().to_lowercase();
    if slug.is_empty() {
        return Err(Error::validation("Invalid agent identifier"));
    }
    Ok(slug)
}

/// Explicit title, or the file name without `.pdf`, capped at 200 characters
pub fn resolve_title(title: Option<&str>, filename: &str) -> Result<String> {
    let explicit = title.map(str::trim).filter(|t| !t.is_empty());

    let title = match explicit {
        Some(title) => {
            let len = title.chars().count();
            if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) {
                return Err(Error::validation(format!(
                    "Title must have between {} and {} characters",
                    MIN_TITLE_CHARS, MAX_TITLE_CHARS
                )));
            }
            title.to_string()
        }
        None => strip_pdf_suffix(filename.trim())
            .trim()
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect(),
    };

    if title.chars().count() < MIN_TITLE_CHARS {
        return Err(Error::validation("A document title is required"));
    }
    Ok(title)
}

fn strip_pdf_suffix(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".pdf") => stem,
        _ => name,
    }
}

/// Blank becomes absent; anything else must be an absolute http(s) URL
pub fn normalize_source_url(source_url: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = source_url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(raw.to_string())),
        _ => Err(Error::validation("sourceUrl must be a valid http(s) URL")),
    }
}
