//! Questline API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use questline_api::config::AppConfig;
use questline_api::state::AppState;
use questline_api::{notifications, seed, telemetry};
use questline_core::clock::SystemClock;
use questline_core::repository::ProgressRepository;
use questline_progress::ProgressCoordinator;
use questline_store::{MIGRATOR, PgProgressRepository};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Read configuration from environment.
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Questline API server");

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let repository: Arc<dyn ProgressRepository> = Arc::new(PgProgressRepository::new(pool.clone()));
    if let Some(path) = &config.quest_seed_file {
        seed::seed_from_file(path, repository.as_ref()).await?;
    }

    // The catalog must load before any request is served.
    let coordinator = Arc::new(ProgressCoordinator::new(
        repository,
        Arc::new(SystemClock),
        config.coordinator.clone(),
    ));
    coordinator.reload_catalog().await?;
    let notification_logger = notifications::spawn_notification_logger(&coordinator);

    // Build router.
    // TODO: Replace CorsLayer::permissive() with the game server's origin once it is fixed.
    let app = questline_api::app(AppState::new(Arc::clone(&coordinator)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain write-behind before the pool goes away.
    let unwritten = coordinator.shutdown(config.shutdown_drain_timeout).await;
    if unwritten > 0 {
        tracing::warn!(unwritten, "Exiting with unwritten progress");
    }
    drop(coordinator);
    notification_logger.abort();
    pool.close().await;

    tracing::info!("Questline API server stopped");
    telemetry.shutdown();
    Ok(())
}
