//! Route definitions for the `/sessions` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`. All require an established session.
///
/// ```text
/// GET    /                -> list_sessions
/// DELETE /{id}            -> destroy_session
/// POST   /revoke-others   -> revoke_others
/// GET    /idle-timeout    -> get_idle_timeout
/// PUT    /idle-timeout    -> set_idle_timeout
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list_sessions))
        .route("/{id}", delete(sessions::destroy_session))
        .route("/revoke-others", post(sessions::revoke_others))
        .route(
            "/idle-timeout",
            get(sessions::get_idle_timeout).put(sessions::set_idle_timeout),
        )
}
