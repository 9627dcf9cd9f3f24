//! Ask endpoint request and response bodies

use serde::{Deserialize, Serialize};

use super::context::Citation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// Agent slug
    pub agent: String,
    /// User question
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}
