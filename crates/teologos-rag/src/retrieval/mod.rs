//! Query-time retrieval of context passages

pub mod search;

pub use search::{RetrievalService, DEFAULT_TOP_K};
