//! API routes

pub mod ask;
pub mod auth;
pub mod documents;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Routes behind the bearer token
pub fn api_routes(state: AppState, max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/ask", post(ask::ask))
        .route("/agents", get(documents::list_agents))
        .route(
            "/agents/:agent_id/documents",
            get(documents::list_documents)
                .post(documents::upload_document)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/agents/:agent_id/documents/:doc_id",
            delete(documents::delete_document),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::require_bearer))
}
