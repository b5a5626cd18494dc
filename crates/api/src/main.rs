use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medlock_api::background;
use medlock_api::config::ServerConfig;
use medlock_api::error::{install_panic_hook, set_debug_errors};
use medlock_api::router::build_app_router;
use medlock_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medlock_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Panic payloads are scrubbed before they reach the log.
    install_panic_hook();

    let config = ServerConfig::from_env();
    set_debug_errors(config.security.debug_errors);
    tracing::info!(host = %config.host, port = %config.port, "Configuration loaded");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = medlock_db::create_pool(&database_url)
        .await
        .expect("Database connection failed");
    medlock_db::health_check(&pool)
        .await
        .expect("Database did not answer the readiness probe");
    medlock_db::run_migrations(&pool)
        .await
        .expect("Migration run failed");
    tracing::info!("Database ready, migrations applied");

    // Retention runs beside the server and is cancelled at shutdown so the
    // final sweep is never cut off mid-delete.
    let retention_cancel = tokio_util::sync::CancellationToken::new();
    let retention_handle = tokio::spawn(background::audit_retention::run(
        pool.clone(),
        config.security.audit_retention_days,
        retention_cancel.clone(),
    ));

    let state = AppState::new(pool, config.clone());
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(config.host.parse().expect("HOST is not an IP address"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Could not bind the listen address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Connections drained, stopping background work");
    retention_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        retention_handle,
    )
    .await;
    tracing::info!("Shutdown complete");
}

/// Resolve when the process is asked to stop: SIGINT from a terminal or
/// SIGTERM from a process manager.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Could not install the Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Could not install the SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
