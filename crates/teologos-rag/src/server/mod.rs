//! HTTP server

pub mod routes;
pub mod state;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{RagConfig, ServerConfig};
use crate::error::{Error, Result};
use state::AppState;

pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(&config)?;
        Ok(Self { config, state })
    }

    fn build_router(&self) -> Router {
        router(self.state.clone(), &self.config.server)
    }

    /// Bind and serve until the process stops
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting TeologOS RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Full application router: public health endpoints plus the bearer-guarded API
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version))
        .merge(routes::api_routes(state.clone(), server.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "uptime": state.uptime(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn version() -> Json<Value> {
    let mut body = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    });
    if let Some(commit) = std::env::var("GIT_COMMIT").ok().filter(|c| !c.trim().is_empty()) {
        body["commit"] = Value::String(commit.trim().to_string());
    }
    Json(body)
}
