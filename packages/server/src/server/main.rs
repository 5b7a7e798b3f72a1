// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use device_auth_core::kernel::{PostgresDocumentStore, RestIdentityProvider, ServerDeps};
use device_auth_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,device_auth_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting device authorization API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(flow = %config.auth_flow, "Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    let store = PostgresDocumentStore::new(pool);

    // Run migrations
    tracing::info!("Running database migrations...");
    store.migrate().await?;
    tracing::info!("Migrations complete");

    let identity = RestIdentityProvider::new(&config.identity_base_url, &config.identity_api_key);
    let deps = ServerDeps::new(
        Arc::new(store),
        Arc::new(identity),
        config.device_scan_timeout,
    );

    // Build application
    let app = build_app(deps, config.auth_flow);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
