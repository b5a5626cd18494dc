pub mod audit;
pub mod auth;
pub mod health;
pub mod sessions;

use axum::{middleware, Router};

use crate::middleware::session::require_session;
use crate::state::AppState;

/// Assemble the route tree nested under `/api/v1`.
///
/// ```text
/// /auth/login                            password step (public)
/// /auth/verify-otp                       OTP step, issues session (public)
/// /auth/logout                           logout (session required)
///
/// /sessions                              list own devices (session required)
/// /sessions/{id}                         revoke one own session (DELETE)
/// /sessions/revoke-others                revoke all but current (POST)
/// /sessions/idle-timeout                 get, set idle preference (GET, PUT)
///
/// /audit/events                          filtered listing (auditor/admin)
/// /audit/events/{id}/flag                hold for investigation (POST)
/// /audit/events/{id}/unflag              release hold (POST)
/// /audit/subjects/{type}/{id}            per-subject trail
/// /audit/actors/{id}                     per-user trail
/// /audit/flagged                         held events only
/// /audit/security-events                 rejections and account security
/// /audit/phi-access/{patient_id}         patient disclosure report
/// /audit/retention/run                   retention sweep (admin only)
/// ```
///
/// Everything except `/auth/login` and `/auth/verify-otp` sits behind the
/// session guard, which also enforces CSRF on write verbs and rotates the
/// session token on schedule. The `/audit` subtree is additionally wrapped
/// by the access recorder so reads of the trail land in the trail.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        // Logout needs the session it is ending.
        .nest("/auth", auth::session_router())
        // Device/session management for the signed-in user.
        .nest("/sessions", sessions::router())
        // Compliance surface; audited by its own access layer.
        .nest("/audit", audit::router(state.clone()))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    Router::new()
        // Credential ceremony, reachable without a session.
        .nest("/auth", auth::public_router())
        .merge(guarded)
}
