//! Embed a question and fetch the agent's nearest passages

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, ScoredPoint, VectorIndex};
use crate::types::{ContextItem, PageRef};

/// Passages fetched when the caller gives no positive limit
pub const DEFAULT_TOP_K: usize = 8;

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Context items in the index's relevance order.
    ///
    /// Blank inputs and an empty query embedding give an empty list, not an error.
    pub async fn retrieve(&self, agent_slug: &str, question: &str, top_k: usize) -> Result<Vec<ContextItem>> {
        let agent_slug = agent_slug.trim();
        let question = question.trim();
        if agent_slug.is_empty() || question.is_empty() {
            return Ok(Vec::new());
        }
        let limit = if top_k > 0 { top_k } else { DEFAULT_TOP_K };

        let embedding = self.embedder.embed_query(question).await?;
        if embedding.is_empty() {
            tracing::warn!("Empty query embedding for {}, answering without context", agent_slug);
            return Ok(Vec::new());
        }

        let points = self.index.search(agent_slug, &embedding, limit).await?;
        let items: Vec<ContextItem> = points
            .iter()
            .enumerate()
            .filter_map(|(i, point)| context_from_point(i, point))
            .collect();

        tracing::debug!(
            "Retrieved {} context items ({} hits) for {}",
            items.len(),
            points.len(),
            agent_slug
        );
        Ok(items)
    }
}

/// Normalize one search hit. Points without usable text are skipped.
fn context_from_point(index: usize, point: &ScoredPoint) -> Option<ContextItem> {
    let empty = Map::new();
    let payload = point.payload.as_ref().unwrap_or(&empty);

    let text = ["text", "content"]
        .iter()
        .find_map(|key| non_blank(payload, key))?
        .trim()
        .to_string();

    let title = non_blank(payload, "title")
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| format!("Trecho {}", index + 1));

    let page = match payload.get("page") {
        Some(Value::Number(n)) => n.as_f64().filter(|n| n.is_finite()).map(PageRef::Number),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(PageRef::Text(s.clone())),
        _ => None,
    };

    let ord = payload
        .get("ord")
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .unwrap_or((index + 1) as f64);

    Some(ContextItem {
        text,
        title,
        section: non_blank(payload, "section").map(str::to_string),
        page,
        url: non_blank(payload, "url").map(str::to_string),
        ord,
    })
}

fn non_blank<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
