//! Agent and document management endpoints

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::IngestRequest;
use crate::server::state::AppState;
use crate::types::{Agent, Document};

/// GET /agents - list known agents
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<Agent>>> {
    let agents = state.store().list_agents().await?;
    Ok(Json(agents))
}

/// GET /agents/:agent_id/documents - documents of an agent, newest first
pub async fn list_documents(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<Document>>> {
    let documents = state.ingestion().list(&agent_id).await?;
    Ok(Json(documents))
}

/// POST /agents/:agent_id/documents - upload and ingest one PDF
///
/// Multipart fields: `file` (required), `title`, `sourceUrl`.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Document>)> {
    let mut multipart = multipart.map_err(|e| Error::validation(e.body_text()))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title = None;
    let mut source_url = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                if !is_pdf(content_type.as_deref(), &filename) {
                    return Err(Error::validation(format!(
                        "{} is not a PDF ({})",
                        filename,
                        content_type.as_deref().unwrap_or("no content type")
                    )));
                }
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, data.to_vec()));
            }
            "title" => title = Some(field.text().await.map_err(multipart_error)?),
            "sourceUrl" => source_url = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (filename, data) = file.ok_or_else(|| Error::validation("missing file field"))?;
    if data.is_empty() {
        return Err(Error::validation(format!("{} is empty", filename)));
    }
    tracing::info!("Upload for {}: {} ({} bytes)", agent_id, filename, data.len());

    let document = state
        .ingestion()
        .ingest(IngestRequest {
            agent_id,
            title,
            filename,
            source_url,
            data,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// DELETE /agents/:agent_id/documents/:doc_id - remove a document and its vectors
pub async fn delete_document(
    State(state): State<AppState>,
    Path((agent_id, doc_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let doc_id = Uuid::parse_str(doc_id.trim())
        .map_err(|_| Error::validation(format!("invalid document id: {}", doc_id)))?;
    state.ingestion().remove(&agent_id, doc_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn is_pdf(content_type: Option<&str>, filename: &str) -> bool {
    let by_type = content_type
        .map(|ct| ct.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false);
    by_type || filename.to_ascii_lowercase().ends_with(".pdf")
}

fn multipart_error(e: MultipartError) -> Error {
    Error::validation(format!("malformed upload ({}): {}", e.status(), e.body_text()))
}
