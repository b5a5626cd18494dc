//! The session guard.
//!
//! Applied as a route layer to every protected route. Per request it:
//!
//! 1. resolves the cookie token to an active, unexpired session (expired
//!    rows are deactivated on the spot);
//! 2. recomputes the request fingerprint and destroys the session outright
//!    on a mismatch;
//! 3. enforces the CSRF header on state-changing verbs;
//! 4. updates `last_activity_at` exactly once;
//! 5. rotates the session token when the rotation interval has elapsed,
//!    delivering the replacement cookie and CSRF token on the response.
//!
//! Every rejection is the same client-visible 401; the cause is recorded as
//! a security event before the response leaves.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{ACCEPT_LANGUAGE, SET_COOKIE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use medlock_core::audit::{actions, subjects};
use medlock_core::error::SecurityError;
use medlock_core::types::DbId;
use medlock_core::{csrf, fingerprint, token};
use medlock_db::models::audit::CreateAuditEvent;
use medlock_db::repositories::session_repo::{SessionRepo, SessionValidation};
use serde_json::json;

use crate::auth::cookie;
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the CSRF token: echoed by the client on state-changing
/// requests, and set on the response when rotation issues a replacement.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The validated session, inserted into request extensions by the guard.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: DbId,
    pub user_id: DbId,
    pub role: String,
    /// Hash currently stored for this session. Reflects the post-rotation
    /// value when this request rotated.
    pub token_hash: String,
    pub idle_timeout_secs: i64,
}

/// Extractor handing the guard's [`SessionContext`] to a handler.
///
/// ```ignore
/// async fn handler(AuthSession(ctx): AuthSession) -> AppResult<Json<()>> {
///     tracing::info!(user_id = ctx.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
pub struct AuthSession(pub SessionContext);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .map(AuthSession)
            .ok_or(AppError::Security(SecurityError::AuthenticationRequired))
    }
}

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Client IP as reported by the proxy headers, first hop first. None when
/// the request carries no address information.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn accept_language(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Record the precise cause as a security event, then answer with the
/// uniform rejection.
async fn reject(
    state: &AppState,
    err: SecurityError,
    actor_user_id: Option<DbId>,
    details: serde_json::Value,
    source_ip: Option<String>,
    agent: Option<String>,
) -> Response {
    if let Some(action) = err.security_event_action() {
        state
            .recorder
            .security_event(action, actor_user_id, details, source_ip, agent)
            .await;
    }
    AppError::Security(err).into_response()
}

/// Middleware entry point; see the module docs for the sequence.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let security = &state.config.security;
    let source_ip = client_ip(request.headers());
    let agent = user_agent(request.headers());
    let lang = accept_language(request.headers());
    let csrf_candidate = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let method = request.method().clone();

    let Some(raw_token) = cookie::session_token(request.headers()) else {
        return reject(
            &state,
            SecurityError::AuthenticationRequired,
            None,
            json!({ "reason": "no_session_cookie" }),
            source_ip,
            agent,
        )
        .await;
    };
    let presented_hash = token::hash_token(&raw_token);

    let validation = match SessionRepo::validate(
        &state.pool,
        &presented_hash,
        security.session_rotation_interval_secs,
    )
    .await
    {
        Ok(v) => v,
        Err(e) => return AppError::Database(e).into_response(),
    };

    let (session, role, idle_timeout_secs, needs_rotation) = match validation {
        SessionValidation::Valid {
            session,
            role,
            idle_timeout_secs,
            needs_rotation,
        } => (session, role, idle_timeout_secs, needs_rotation),
        SessionValidation::NotFound => {
            return reject(
                &state,
                SecurityError::AuthenticationRequired,
                None,
                json!({ "token": token::mask_token(&raw_token) }),
                source_ip,
                agent,
            )
            .await;
        }
        SessionValidation::TimedOut { session, cause } => {
            return reject(
                &state,
                SecurityError::SessionExpired(cause),
                Some(session.user_id),
                json!({ "session_id": session.id }),
                source_ip,
                agent,
            )
            .await;
        }
    };

    // Fingerprint mismatch destroys the session outright; rejecting softly
    // would hand the stolen token back for another try.
    let fingerprint_ok = fingerprint::matches(
        &security.fingerprint_key,
        agent.as_deref().unwrap_or(""),
        lang.as_deref().unwrap_or(""),
        &session.fingerprint_hash,
    );
    if !fingerprint_ok {
        if let Err(e) =
            SessionRepo::destroy(&state.pool, session.id, actions::HIJACK_DESTROYED).await
        {
            tracing::error!(
                error = %e,
                session_id = session.id,
                "Could not destroy session after fingerprint mismatch"
            );
        }
        return reject(
            &state,
            SecurityError::HijackSuspected,
            Some(session.user_id),
            json!({ "session_id": session.id }),
            source_ip,
            agent,
        )
        .await;
    }

    if is_state_changing(&method) {
        let csrf_ok = csrf_candidate.as_deref().is_some_and(|candidate| {
            csrf::verify(
                candidate,
                &session.csrf_token_hash,
                Utc::now(),
                session.csrf_issued_at,
                security.csrf_lifetime_secs,
            )
        });
        if !csrf_ok {
            return reject(
                &state,
                SecurityError::CsrfInvalid,
                Some(session.user_id),
                json!({
                    "session_id": session.id,
                    "header_present": csrf_candidate.is_some(),
                }),
                source_ip,
                agent,
            )
            .await;
        }
    }

    // The single activity touch for this request. A false return means the
    // session was revoked mid-flight; this request may finish, the next one
    // is rejected at validation.
    match SessionRepo::touch_activity(&state.pool, session.id).await {
        Ok(_) => {}
        Err(e) => return AppError::Database(e).into_response(),
    }

    let mut issued_cookie: Option<String> = None;
    let mut issued_csrf: Option<String> = None;
    let mut current_hash = presented_hash;

    if needs_rotation {
        let replacement = token::generate_token();
        match SessionRepo::rotate_token(&state.pool, &current_hash, &replacement.hash).await {
            Ok(true) => {
                current_hash = replacement.hash.clone();
                let csrf_replacement = token::generate_token();
                match SessionRepo::rotate_csrf(&state.pool, session.id, &csrf_replacement.hash)
                    .await
                {
                    Ok(true) => issued_csrf = Some(csrf_replacement.plaintext),
                    // On failure the stored CSRF hash is unchanged, so the
                    // client's existing token stays valid; issue nothing.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, session_id = session.id, "CSRF rotation failed");
                    }
                }
                issued_cookie = Some(replacement.plaintext.clone());
                state
                    .recorder
                    .record(CreateAuditEvent {
                        actor_user_id: Some(session.user_id),
                        subject_type: subjects::SESSION.to_string(),
                        subject_id: Some(session.id),
                        action: actions::ROTATION.to_string(),
                        description: String::new(),
                        details: Some(json!({ "token": token::mask_token(&replacement.plaintext) })),
                        source_ip: source_ip.clone(),
                        user_agent: agent.clone(),
                    })
                    .await;
            }
            // Zero rows: a concurrent request won the rotation. The client
            // already holds the winner's cookie; send nothing.
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, session_id = session.id, "Token rotation failed");
            }
        }
    }

    let context = SessionContext {
        session_id: session.id,
        user_id: session.user_id,
        role,
        token_hash: current_hash,
        idle_timeout_secs,
    };
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    // Deliver the rotated credentials, unless the handler set a session
    // cookie of its own (logout's clearing cookie must win).
    if let Some(cookie_value) = issued_cookie {
        if !response.headers().contains_key(SET_COOKIE) {
            let remaining = (session.expires_at - Utc::now()).num_seconds().max(0);
            if let Ok(value) = HeaderValue::from_str(&cookie::build(&cookie_value, remaining)) {
                response.headers_mut().append(SET_COOKIE, value);
            }
            if let Some(csrf_value) = issued_csrf {
                if let Ok(value) = HeaderValue::from_str(&csrf_value) {
                    response.headers_mut().insert(CSRF_HEADER, value);
                }
            }
        }
    }

    response
}
