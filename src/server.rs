//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire the
//! SQLite store, the embedding provider and the MCP tool handler into a
//! running server.

use crate::config::{Config, RetrievalConfig};
use crate::embedding;
use crate::memory::backend::SqliteStore;
use crate::memory::MemoryService;
use crate::tools::MemvaultTools;
use anyhow::{ensure, Result};
use rmcp::ServiceExt;
use std::sync::Arc;

/// Open the store and embedding provider and build the service over them.
pub fn build_service(config: &Config) -> Result<MemoryService> {
    let provider = embedding::create_provider(&config.embedding)?;
    ensure!(
        provider.dimensions() == config.embedding.dimension,
        "embedding provider produces {} dimensions, config says {}",
        provider.dimensions(),
        config.embedding.dimension
    );
    let embedder: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!(model = %embedder.model_name(), "embedding provider ready");

    let db_path = config.resolved_db_path();
    let store = SqliteStore::open(&db_path, config.embedding.dimension, &config.embedding.model)?;
    tracing::info!(db = %db_path.display(), "database ready");

    Ok(MemoryService::new(embedder, Arc::new(store))
        .with_overfetch_factor(config.retrieval.overfetch_factor))
}

fn setup_shared_state(config: &Config) -> Result<(MemoryService, Arc<RetrievalConfig>)> {
    let service = build_service(config)?;
    Ok((service, Arc::new(config.retrieval.clone())))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: Config) -> Result<()> {
    tracing::info!("starting memvault MCP server on stdio");

    let (service, retrieval) = setup_shared_state(&config)?;

    let tools = MemvaultTools::new(service, retrieval);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP at `/mcp`. Stops on ctrl-c.
pub async fn serve_http(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting memvault MCP server on HTTP");

    let (service, retrieval) = setup_shared_state(&config)?;

    let http_service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MemvaultTools::new(service.clone(), retrieval.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", http_service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
