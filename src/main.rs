use std::sync::Arc;
use std::time::Duration;

use chat_relay_service::{
    config, db, error, logging, migrations, routes,
    state::AppState,
    websocket::{heartbeat::LivenessMonitor, RoomRegistry},
};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Run embedded migrations (idempotent)
    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    let registry = RoomRegistry::new();
    let state = AppState::new(db, cfg.clone(), registry.clone());

    let monitor = LivenessMonitor::spawn(
        registry,
        Duration::from_secs(cfg.heartbeat_interval_secs),
    );

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-relay-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    let app = routes::build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    // Cancel the heartbeat timer so the periodic task does not outlive the
    // server loop.
    monitor.shutdown();
    tracing::info!("chat-relay-service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
