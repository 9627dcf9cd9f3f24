//! Vector index trait for per-agent passage collections

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

/// Points per upsert request when the implementation does not say otherwise
pub const DEFAULT_UPSERT_BATCH: usize = 200;

/// Collection holding an agent's passages
pub fn collection_name(agent_slug: &str) -> String {
    format!("passages_{}", agent_slug)
}

/// Payload written with every point; retrieval reads it back verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassagePayload {
    pub agent_slug: String,
    pub title: String,
    pub doc_id: Uuid,
    pub url: Option<String>,
    pub ord: u32,
    pub text: String,
    /// Page label such as "Página 3" or "Páginas 3-4"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// First page the passage draws from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A point to upsert
#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PassagePayload,
}

/// Search hit with its raw payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScoredPoint {
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

/// What the index reports about a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Missing,
    /// `vector_size` is `None` when the index did not report one
    Present { vector_size: Option<usize> },
}

/// Trait for the vector index
///
/// Implementations:
/// - `QdrantIndex`: Qdrant REST API
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fetch collection metadata
    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus>;

    /// Create a cosine collection of the given dimensionality
    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()>;

    /// Drop a collection and every point in it
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Write one batch of points in a single request
    async fn upsert_batch(&self, collection: &str, points: &[VectorPoint]) -> Result<()>;

    /// Nearest neighbours with payload. A missing collection yields no hits.
    async fn search_collection(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete every point whose payload `docId` matches
    async fn delete_points_by_document(&self, collection: &str, document_id: Uuid) -> Result<()>;

    /// Maximum points per `upsert_batch`
    fn upsert_batch_size(&self) -> usize {
        DEFAULT_UPSERT_BATCH
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Create the agent's collection if absent; recreate it on a dimensionality
    /// change, which drops every vector previously stored for the agent.
    async fn ensure_collection(&self, agent_slug: &str, vector_size: usize) -> Result<()> {
        let collection = collection_name(agent_slug);

        match self.collection_status(&collection).await? {
            CollectionStatus::Missing => {
                tracing::info!("Creating collection {} (size {})", collection, vector_size);
                self.create_collection(&collection, vector_size).await
            }
            CollectionStatus::Present {
                vector_size: Some(current),
            } if current != vector_size => {
                tracing::warn!(
                    "Collection {} has size {}, expected {}; recreating (agent must be re-ingested)",
                    collection,
                    current,
                    vector_size
                );
                self.delete_collection(&collection).await?;
                self.create_collection(&collection, vector_size).await
            }
            CollectionStatus::Present { .. } => Ok(()),
        }
    }

    /// Upsert points in bounded batches. A failed batch aborts the rest;
    /// earlier batches stay committed.
    async fn upsert(&self, agent_slug: &str, points: &[VectorPoint]) -> Result<()> {
        let collection = collection_name(agent_slug);
        let batch_size = self.upsert_batch_size().max(1);

        for (i, batch) in points.chunks(batch_size).enumerate() {
            self.upsert_batch(&collection, batch).await?;
            tracing::debug!("Upserted batch {} ({} points) into {}", i + 1, batch.len(), collection);
        }
        Ok(())
    }

    /// Search the agent's collection
    async fn search(&self, agent_slug: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        self.search_collection(&collection_name(agent_slug), vector, limit)
            .await
    }

    /// Remove a document's points from the agent's collection
    async fn delete_document(&self, agent_slug: &str, document_id: Uuid) -> Result<()> {
        self.delete_points_by_document(&collection_name(agent_slug), document_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        status: Option<CollectionStatus>,
        calls: Mutex<Vec<String>>,
        fail_batch: Option<usize>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn collection_status(&self, _collection: &str) -> Result<CollectionStatus> {
            Ok(self.status.unwrap_or(CollectionStatus::Missing))
        }

        async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
            self.calls.lock().push(format!("create {} {}", collection, vector_size));
            Ok(())
        }

        async fn delete_collection(&self, collection: &str) -> Result<()> {
            self.calls.lock().push(format!("delete {}", collection));
            Ok(())
        }

        async fn upsert_batch(&self, _collection: &str, points: &[VectorPoint]) -> Result<()> {
            let mut calls = self.calls.lock();
            if Some(calls.len()) == self.fail_batch {
                return Err(Error::vector_db("batch rejected"));
            }
            calls.push(format!("upsert {}", points.len()));
            Ok(())
        }

        async fn search_collection(
            &self,
            _collection: &str,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<ScoredPoint>> {
            Ok(Vec::new())
        }

        async fn delete_points_by_document(&self, _collection: &str, _document_id: Uuid) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn points(n: usize) -> Vec<VectorPoint> {
        let doc_id = Uuid::new_v4();
        (0..n)
            .map(|i| VectorPoint {
                id: Uuid::new_v4(),
                vector: vec![0.0, 1.0],
                payload: PassagePayload {
                    agent_slug: "aquinas".into(),
                    title: "Suma".into(),
                    doc_id,
                    url: None,
                    ord: i as u32,
                    text: format!("trecho {}", i),
                    section: None,
                    page: None,
                },
            })
            .collect()
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("calvino"), "passages_calvino");
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_collection() {
        let index = RecordingIndex::default();
        index.ensure_collection("aquinas", 1536).await.unwrap();
        assert_eq!(*index.calls.lock(), vec!["create passages_aquinas 1536"]);
    }

    #[tokio::test]
    async fn test_ensure_recreates_on_size_mismatch() {
        let index = RecordingIndex {
            status: Some(CollectionStatus::Present {
                vector_size: Some(768),
            }),
            ..Default::default()
        };
        index.ensure_collection("aquinas", 1536).await.unwrap();
        assert_eq!(
            *index.calls.lock(),
            vec!["delete passages_aquinas", "create passages_aquinas 1536"]
        );
    }

    #[tokio::test]
    async fn test_ensure_keeps_matching_or_unknown_size() {
        for vector_size in [Some(1536), None] {
            let index = RecordingIndex {
                status: Some(CollectionStatus::Present { vector_size }),
                ..Default::default()
            };
            index.ensure_collection("aquinas", 1536).await.unwrap();
            assert!(index.calls.lock().is_empty());
        }
    }

    #[tokio::test]
    async fn test_upsert_batches_of_200() {
        let index = RecordingIndex::default();
        index.upsert("aquinas", &points(450)).await.unwrap();
        assert_eq!(*index.calls.lock(), vec!["upsert 200", "upsert 200", "upsert 50"]);
    }

    #[tokio::test]
    async fn test_upsert_stops_at_failed_batch() {
        let index = RecordingIndex {
            fail_batch: Some(1),
            ..Default::default()
        };
        let err = index.upsert("aquinas", &points(450)).await.unwrap_err();
        assert!(matches!(err, Error::VectorDb(_)));
        assert_eq!(*index.calls.lock(), vec!["upsert 200"]);
    }

    #[test]
    fn test_payload_field_names() {
        let point = &points(1)[0];
        let json = serde_json::to_value(&point.payload).unwrap();
        for key in ["agentSlug", "title", "docId", "url", "ord", "text"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
