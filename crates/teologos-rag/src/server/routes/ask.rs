//! Ask endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AskRequest, AskResponse};

/// Longest question accepted, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

static AGENT_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]{2,32}$").expect("valid agent slug pattern"));

/// POST /ask - answer a question as one of the personas
pub async fn ask(
    State(state): State<AppState>,
    body: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>> {
    let Json(request) = body.map_err(|e| Error::validation(e.body_text()))?;
    let (agent, message) = validate(&request)?;

    tracing::info!("Ask for {} ({} chars)", agent, message.chars().count());
    let response = state.orchestrator().ask(&agent, message).await?;
    Ok(Json(response))
}

/// Normalized agent slug and trimmed message
fn validate(request: &AskRequest) -> Result<(String, &str)> {
    let agent = request.agent.trim().to_lowercase();
    if !AGENT_SLUG.is_match(&agent) {
        return Err(Error::validation(format!("invalid agent: {:?}", request.agent)));
    }

    let message = request.message.trim();
    let length = message.chars().count();
    if length == 0 || length > MAX_MESSAGE_CHARS {
        return Err(Error::validation(format!(
            "message must have 1 to {} characters, got {}",
            MAX_MESSAGE_CHARS, length
        )));
    }

    Ok((agent, message))
}
