// LMS Backend Server
// Hosts the coin ledger and the completion-to-reward pipeline

use anyhow::Result;
use lms_backend::config::{Config, LogFormat};
use lms_backend::database::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lms_backend=info,sqlx=warn,tower_http=info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting LMS Backend Server");
    info!("Configuration:");
    info!("  Server Port: {}", config.server_port);
    info!("  Max DB Connections: {}", config.max_connections);

    // One pool for the whole process, closed after shutdown
    let db = Database::init(&config.database_url, config.max_connections).await?;

    let app = lms_backend::router(db.clone());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("LMS Backend listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Closing database pool");
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
