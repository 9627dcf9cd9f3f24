//! Core types for the RAG service

pub mod ask;
pub mod context;
pub mod document;

pub use ask::{AskRequest, AskResponse};
pub use context::{Citation, ContextItem, PageRef};
pub use document::{Agent, Document, NewDocument, Passage};
