use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use consultorio::config::{AppConfig, StoreBackend};
use consultorio::database::create_pool;
use consultorio::observability::init_tracing;
use consultorio::schema::init_schema;
use consultorio::store::{ClinicStore, MemoryStore, PgStore};
use consultorio::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.observability)?;

    info!(
        bind_addr = %config.bind_addr,
        backend = ?config.backend,
        "Starting consultorio"
    );

    let store: Arc<dyn ClinicStore> = match config.backend {
        StoreBackend::Postgres => {
            let database = config.database.clone().with_resolved_host().await;
            let pool = create_pool(&database);
            init_schema(&pool).await;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.session.clone()).context("Invalid templates")?;
    let app = build_router(state, &config.http);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(address = %config.bind_addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
