//! Qdrant REST client

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::QdrantConfig;
use crate::error::{Error, Result};

use super::vector_store::{CollectionStatus, ScoredPoint, VectorIndex, VectorPoint};

/// Qdrant vector index over HTTP
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    upsert_batch_size: usize,
}

impl QdrantIndex {
    pub fn new(config: &QdrantConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &QdrantConfig) -> Self {
        Self {
            client,
            base_url: normalize_base_url(&config.url),
            api_key: config.api_key.clone(),
            upsert_batch_size: config.upsert_batch_size,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("{}: {}", action, e)))
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "http://qdrant:6333".to_string()
    } else {
        trimmed.to_string()
    }
}

fn collection_path(collection: &str) -> String {
    format!("/collections/{}", collection)
}

/// Turn a non-success response into an error carrying status and body
async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::vector_db(format!("{} failed ({}): {}", action, status, body)))
}

/// Search responses come either wrapped in `{result: [...]}` or as a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Envelope { result: Vec<ScoredPoint> },
    Bare(Vec<ScoredPoint>),
}

impl SearchResponse {
    fn into_points(self) -> Vec<ScoredPoint> {
        match self {
            SearchResponse::Envelope { result } | SearchResponse::Bare(result) => result,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CollectionInfoResponse {
    #[serde(default)]
    result: Option<CollectionInfo>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    config: Option<CollectionConfig>,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    #[serde(default)]
    params: Option<CollectionParams>,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    #[serde(default)]
    vectors: Option<VectorsConfig>,
}

#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
}

/// Single unnamed vector, or a map of named vectors
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorsConfig {
    Single(VectorParams),
    Named(BTreeMap<String, VectorParams>),
}

impl CollectionInfoResponse {
    fn vector_size(&self) -> Option<usize> {
        let vectors = self
            .result
            .as_ref()?
            .config
            .as_ref()?
            .params
            .as_ref()?
            .vectors
            .as_ref()?;
        match vectors {
            VectorsConfig::Single(params) => Some(params.size),
            VectorsConfig::Named(named) => named.values().next().map(|p| p.size),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus> {
        let response = self
            .send(
                self.request(Method::GET, &collection_path(collection)),
                "Collection lookup",
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CollectionStatus::Missing);
        }
        let response = ensure_success(response, "Collection lookup").await?;

        // Unknown shapes leave the collection untouched
        let info: CollectionInfoResponse = response.json().await.unwrap_or_default();
        Ok(CollectionStatus::Present {
            vector_size: info.vector_size(),
        })
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
        let body = json!({
            "vectors": { "size": vector_size, "distance": "Cosine" }
        });
        let response = self
            .send(
                self.request(Method::PUT, &collection_path(collection)).json(&body),
                "Collection create",
            )
            .await?;
        ensure_success(response, "Collection create").await?;
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let response = self
            .send(
                self.request(Method::DELETE, &collection_path(collection)),
                "Collection delete",
            )
            .await?;
        ensure_success(response, "Collection delete").await?;
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, points: &[VectorPoint]) -> Result<()> {
        let path = format!("{}/points", collection_path(collection));
        let response = self
            .send(
                self.request(Method::PUT, &path).json(&json!({ "points": points })),
                "Point upsert",
            )
            .await?;
        ensure_success(response, "Point upsert").await?;
        Ok(())
    }

    async fn search_collection(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let path = format!("{}/points/search", collection_path(collection));
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let response = self
            .send(self.request(Method::POST, &path).json(&body), "Search")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Collection {} not found, no results", collection);
            return Ok(Vec::new());
        }
        let response = ensure_success(response, "Search").await?;

        let decoded: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Unreadable search response: {}", e)))?;
        Ok(decoded.into_points())
    }

    async fn delete_points_by_document(&self, collection: &str, document_id: Uuid) -> Result<()> {
        let path = format!("{}/points/delete?wait=true", collection_path(collection));
        let body = json!({
            "filter": {
                "must": [{ "key": "docId", "match": { "value": document_id.to_string() } }]
            }
        });
        let response = self
            .send(self.request(Method::POST, &path).json(&body), "Point delete")
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response, "Point delete").await?;
        Ok(())
    }

    fn upsert_batch_size(&self) -> usize {
        self.upsert_batch_size
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
