//! Provider abstractions for embeddings, chat completion and the vector index
//!
//! Each remote service sits behind a trait so the pipelines can be assembled
//! from configuration at startup and from stubs in tests.

pub mod embedding;
pub mod llm;
pub mod openai;
pub mod qdrant;
pub mod retry;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, ChatProvider, ChatRole};
pub use openai::{OpenAiChat, OpenAiEmbedder};
pub use qdrant::QdrantIndex;
pub use retry::RetryPolicy;
pub use vector_store::{collection_name, CollectionStatus, PassagePayload, ScoredPoint, VectorIndex, VectorPoint};
