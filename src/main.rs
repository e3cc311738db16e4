//! workspace-vault server entry point.
//!
//! Serves stored snapshots over REST and streams backup events over
//! WebSocket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use workspace_vault::api;
use workspace_vault::app_state::AppState;
use workspace_vault::config::{StorageBackend, VaultConfig};
use workspace_vault::domain::EventBus;
use workspace_vault::persistence::{
    FileSnapshotStore, MemorySnapshotStore, PostgresSnapshotStore, SnapshotStore,
};
use workspace_vault::remote::HttpAssetFetcher;
use workspace_vault::service::BackupService;
use workspace_vault::ws::handler::ws_handler;

const ASSET_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = VaultConfig::from_env().context("loading configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.storage_backend,
        "starting workspace-vault"
    );

    // Build storage and service layers
    let store = open_store(&config).await?;
    let assets = Arc::new(HttpAssetFetcher::new(ASSET_TIMEOUT).context("building HTTP client")?);
    let event_bus = EventBus::new(config.event_bus_capacity);
    let service = BackupService::new(Arc::clone(&store), assets, event_bus);

    let app_state = AppState::new(service);

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await.context("closing snapshot store")?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn open_store(config: &VaultConfig) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match config.storage_backend {
        StorageBackend::File => Arc::new(FileSnapshotStore::new(
            config.storage_path.clone(),
            config.storage_pretty_json,
        )),
        StorageBackend::Memory => Arc::new(MemorySnapshotStore::new()),
        StorageBackend::Postgres => {
            let store = PostgresSnapshotStore::connect(
                &config.database_url,
                config.database_max_connections,
                config.database_min_connections,
                config.database_connect_timeout(),
            )
            .await
            .context("connecting to snapshot database")?;
            store.ensure_schema().await.context("creating snapshot schema")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
