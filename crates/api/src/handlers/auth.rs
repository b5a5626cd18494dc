//! Handlers for the `/auth` resource (login, OTP verification, logout).
//!
//! Login is two-step: credentials buy a short-lived one-time passcode, and
//! only a consumed passcode mints a session. The session token and CSRF
//! value are generated fresh here every time; any session presented before
//! authentication completes is discarded, so a pre-planted cookie can never
//! be promoted to an authenticated one.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use medlock_core::audit::{actions, security_events, subjects};
use medlock_core::error::SecurityError;
use medlock_core::types::Timestamp;
use medlock_core::{fingerprint, token};
use medlock_db::models::audit::CreateAuditEvent;
use medlock_db::models::otp::CreateOtp;
use medlock_db::models::session::CreateSession;
use medlock_db::models::user::{User, UserResponse};
use medlock_db::repositories::otp_repo::{OtpOutcome, OtpRepo};
use medlock_db::repositories::session_repo::SessionRepo;
use medlock_db::repositories::user_repo::UserRepo;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::cookie;
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::session::{accept_language, client_ip, user_agent, AuthSession};
use crate::response::DataResponse;
use crate::state::AppState;

/// One message for every credential failure; which credential was wrong is
/// recorded server-side only.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

const ACCOUNT_LOCKED: &str = "Account is temporarily locked. Try again later.";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful credential check: a passcode has been issued out of band.
#[derive(Debug, Serialize)]
pub struct LoginChallenge {
    pub otp_required: bool,
    /// Seconds until the issued code expires.
    pub expires_in_secs: i64,
}

/// Request body for `POST /auth/verify-otp`.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub username: String,
    pub code: String,
}

/// Successful authentication. The session token itself travels only in the
/// `Set-Cookie` header; the body carries the CSRF token and user info.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub csrf_token: String,
    pub session_expires_at: Timestamp,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Check username + password; on success issue a one-time passcode. The
/// response never includes the code.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<LoginChallenge>>> {
    let security = &state.config.security;
    let source_ip = client_ip(&headers);
    let agent = user_agent(&headers);

    let Some(user) = UserRepo::find_active_by_username(&state.pool, &input.username).await? else {
        // Unknown and deactivated accounts get the same answer, so the
        // endpoint cannot be used to probe which usernames exist.
        state
            .recorder
            .security_event(
                security_events::LOGIN_FAILED,
                None,
                json!({ "username": input.username, "reason": "unknown_or_inactive" }),
                source_ip,
                agent,
            )
            .await;
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    ensure_not_locked(&state, &user, &source_ip, &agent).await?;

    let password_ok = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification error: {e}")))?;
    if !password_ok {
        register_failed_attempt(&state, &user, "wrong_password", source_ip, agent).await?;
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let issued = CreateOtp {
        user_id: user.id,
        code: token::generate_otp(),
        expires_at: Utc::now() + Duration::seconds(security.otp_lifetime_secs),
    };
    OtpRepo::create(&state.pool, &issued).await?;

    state
        .recorder
        .record(CreateAuditEvent {
            actor_user_id: Some(user.id),
            subject_type: subjects::USER.to_string(),
            subject_id: Some(user.id),
            action: actions::OTP_ISSUED.to_string(),
            description: String::new(),
            details: Some(json!({ "expires_in_secs": security.otp_lifetime_secs })),
            source_ip,
            user_agent: agent,
        })
        .await;

    Ok(Json(DataResponse::new(LoginChallenge {
        otp_required: true,
        expires_in_secs: security.otp_lifetime_secs,
    })))
}

/// POST /api/v1/auth/verify-otp
///
/// Consume the passcode and mint the session. Replayed, expired, and
/// unknown codes are distinct outcomes, both in the response code and in
/// the security ledger.
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<VerifyOtpRequest>,
) -> AppResult<Response> {
    let security = &state.config.security;
    let source_ip = client_ip(&headers);
    let agent = user_agent(&headers);
    let lang = accept_language(&headers);

    let Some(user) = UserRepo::find_active_by_username(&state.pool, &input.username).await? else {
        state
            .recorder
            .security_event(
                security_events::OTP_INVALID,
                None,
                json!({ "username": input.username }),
                source_ip,
                agent,
            )
            .await;
        return Err(AppError::Security(SecurityError::OtpInvalid));
    };

    ensure_not_locked(&state, &user, &source_ip, &agent).await?;

    match OtpRepo::verify_and_consume(&state.pool, user.id, &input.code).await? {
        OtpOutcome::Consumed(_) => {}
        OtpOutcome::AlreadyUsed => {
            state
                .recorder
                .security_event(
                    security_events::OTP_REPLAYED,
                    Some(user.id),
                    json!({ "username": user.username }),
                    source_ip,
                    agent,
                )
                .await;
            return Err(AppError::Security(SecurityError::OtpAlreadyUsed));
        }
        OtpOutcome::Expired => {
            state
                .recorder
                .security_event(
                    security_events::OTP_EXPIRED,
                    Some(user.id),
                    json!({ "username": user.username }),
                    source_ip,
                    agent,
                )
                .await;
            return Err(AppError::Security(SecurityError::OtpExpired));
        }
        OtpOutcome::Invalid => {
            register_failed_attempt(&state, &user, "otp_mismatch", source_ip, agent).await?;
            return Err(AppError::Security(SecurityError::OtpInvalid));
        }
    }

    // Discard any session presented before authentication completed.
    if let Some(pre_auth) = cookie::session_token(&headers) {
        discard_pre_auth_session(&state, &pre_auth).await;
    }

    let session_token = token::generate_token();
    let csrf_token = token::generate_token();
    let expires_at = Utc::now() + Duration::seconds(security.session_absolute_lifetime_secs);
    let new_session = CreateSession {
        user_id: user.id,
        token_hash: session_token.hash.clone(),
        csrf_token_hash: csrf_token.hash.clone(),
        fingerprint_hash: fingerprint::compute(
            &security.fingerprint_key,
            agent.as_deref().unwrap_or(""),
            lang.as_deref().unwrap_or(""),
        ),
        device_label: agent.as_deref().map(device_label),
        source_ip: source_ip.clone(),
        user_agent: agent.clone(),
        expires_at,
    };
    let session = SessionRepo::create(&state.pool, &new_session).await?;
    UserRepo::record_successful_login(&state.pool, user.id).await?;

    tracing::info!(user_id = user.id, session_id = session.id, "Login complete");

    let body = DataResponse::new(AuthResponse {
        csrf_token: csrf_token.plaintext,
        session_expires_at: expires_at,
        user: UserResponse::from(&user),
    });
    let mut response = Json(body).into_response();
    set_cookie(
        &mut response,
        &cookie::build(
            &session_token.plaintext,
            security.session_absolute_lifetime_secs,
        ),
    )?;
    Ok(response)
}

/// POST /api/v1/auth/logout
///
/// Destroy the current session and clear the cookie. Returns 204.
pub async fn logout(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
) -> AppResult<Response> {
    SessionRepo::destroy(&state.pool, ctx.session_id, actions::LOGOUT).await?;
    let mut response = StatusCode::NO_CONTENT.into_response();
    set_cookie(&mut response, &cookie::clear())?;
    Ok(response)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_not_locked(
    state: &AppState,
    user: &User,
    source_ip: &Option<String>,
    agent: &Option<String>,
) -> AppResult<()> {
    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            state
                .recorder
                .security_event(
                    security_events::ACCOUNT_LOCKED,
                    Some(user.id),
                    json!({ "locked_until": locked_until }),
                    source_ip.clone(),
                    agent.clone(),
                )
                .await;
            return Err(AppError::Security(SecurityError::Forbidden(
                ACCOUNT_LOCKED.into(),
            )));
        }
    }
    Ok(())
}

/// Count a failed credential or passcode attempt, locking the account when
/// the configured threshold is reached.
async fn register_failed_attempt(
    state: &AppState,
    user: &User,
    reason: &str,
    source_ip: Option<String>,
    agent: Option<String>,
) -> AppResult<()> {
    let security = &state.config.security;
    let count = UserRepo::increment_failed_login(&state.pool, user.id).await?;
    state
        .recorder
        .security_event(
            security_events::LOGIN_FAILED,
            Some(user.id),
            json!({ "reason": reason, "failed_count": count }),
            source_ip.clone(),
            agent.clone(),
        )
        .await;
    if count >= security.max_failed_logins {
        let until = Utc::now() + Duration::minutes(security.lock_duration_mins);
        UserRepo::lock_until(&state.pool, user.id, until).await?;
        state
            .recorder
            .security_event(
                security_events::ACCOUNT_LOCKED,
                Some(user.id),
                json!({ "locked_until": until, "failed_count": count }),
                source_ip,
                agent,
            )
            .await;
    }
    Ok(())
}

/// Best-effort teardown of a session row presented before authentication.
/// Failure here never blocks the login that is in progress.
async fn discard_pre_auth_session(state: &AppState, raw_token: &str) {
    let hash = token::hash_token(raw_token);
    match SessionRepo::find_active_by_token_hash(&state.pool, &hash).await {
        Ok(Some(stale)) => {
            if let Err(e) =
                SessionRepo::destroy(&state.pool, stale.id, actions::FORCED_LOGOUT).await
            {
                tracing::warn!(error = %e, session_id = stale.id, "Could not discard pre-auth session");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Pre-auth session lookup failed"),
    }
}

fn device_label(agent: &str) -> String {
    agent.chars().take(120).collect()
}

fn set_cookie(response: &mut Response, value: &str) -> AppResult<()> {
    let header = HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid Set-Cookie value: {e}")))?;
    response.headers_mut().append(SET_COOKIE, header);
    Ok(())
}
