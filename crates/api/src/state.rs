//! Shared application state passed to all handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::audit::recorder::AuditRecorder;
use crate::config::ServerConfig;

/// Application state shared across all request handlers.
///
/// Cloned per request by axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub recorder: AuditRecorder,
}

impl AppState {
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        Self {
            recorder: AuditRecorder::new(pool.clone()),
            pool,
            config: Arc::new(config),
        }
    }
}
