//! TeologOS RAG server binary
//!
//! Run with: cargo run -p teologos-rag --bin teologos-rag-server
//! Set CONFIG_PATH to read a TOML file; environment variables override it.

use std::path::PathBuf;

use teologos_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teologos_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     TeologOS RAG                          ║
║         Theologian personas with cited answers            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config_path = std::env::var("CONFIG_PATH").ok().map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Chat model: {}", config.openai.chat_model);
    tracing::info!(
        "  - Embedding model: {} (batch {})",
        config.openai.embed_model,
        config.openai.embed_batch_size
    );
    tracing::info!("  - Qdrant: {}", config.qdrant.url);
    tracing::info!(
        "  - Chunking: {} words, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - LLM timeout: {}ms", config.llm.request_timeout_ms);
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Profiles: {}", config.storage.profiles_dir.display());

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST   /ask                                - Ask a persona");
    println!("  GET    /agents                             - List agents");
    println!("  GET    /agents/:agentId/documents          - List documents");
    println!("  POST   /agents/:agentId/documents          - Upload a PDF");
    println!("  DELETE /agents/:agentId/documents/:docId   - Remove a document");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
