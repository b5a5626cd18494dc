//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Pre-session routes mounted at `/auth`.
///
/// ```text
/// POST /login       -> login (step 1: password, issues OTP challenge)
/// POST /verify-otp  -> verify_otp (step 2: OTP, establishes session)
/// ```
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
}

/// Session-holder routes mounted at `/auth` behind the session guard.
///
/// ```text
/// POST /logout  -> logout
/// ```
pub fn session_router() -> Router<AppState> {
    Router::new().route("/logout", post(auth::logout))
}
