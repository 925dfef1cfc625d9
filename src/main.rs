use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reviewer_app::api;
use reviewer_app::config::AppConfig;
use reviewer_app::database::SqliteStore;
use reviewer_app::service::ReviewService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reviewer_app=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reviewer assignment service");

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
    info!("Configuration loaded");

    let store = SqliteStore::new(&config.database_url, config.database_max_connections)
        .await
        .context("failed to open database")?;
    info!("Database connected");

    store
        .run_migrations()
        .await
        .context("failed to run migrations")?;

    let service = Arc::new(ReviewService::with_store(store.clone()));
    let app = api::router(service);

    let addr = config.bind_address();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.pool().close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
