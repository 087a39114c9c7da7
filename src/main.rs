use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lms_api_rust::{app, config, database::DatabaseManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up MONGODB_URI, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting LMS API in {:?} mode", config.environment);

    // Index creation needs a reachable database; the server starts regardless
    // and reports the outage through /health.
    tokio::spawn(async {
        if let Err(e) = DatabaseManager::ensure_indexes().await {
            tracing::warn!("Could not ensure MongoDB indexes: {}", e);
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LMS API listening on http://{}", bind_addr);

    axum::serve(listener, app()).await.context("server error")?;
    Ok(())
}
