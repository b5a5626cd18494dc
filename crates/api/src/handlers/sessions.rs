//! Handlers for the device-session management surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use medlock_core::audit::{actions, subjects};
use medlock_core::error::SecurityError;
use medlock_core::session_policy::clamp_idle_timeout;
use medlock_core::types::DbId;
use medlock_db::models::audit::CreateAuditEvent;
use medlock_db::models::session::DeviceSession;
use medlock_db::repositories::session_repo::SessionRepo;
use medlock_db::repositories::user_repo::UserRepo;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::session::AuthSession;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RevokedCount {
    pub revoked: u64,
}

#[derive(Debug, Serialize)]
pub struct IdleTimeoutSetting {
    pub idle_timeout_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIdleTimeout {
    pub idle_timeout_secs: i64,
}

/// GET /api/v1/sessions
///
/// Active sessions for the calling user, masked IPs, current one marked.
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
) -> AppResult<Json<DataResponse<Vec<DeviceSession>>>> {
    let sessions = SessionRepo::list_active_for_user(&state.pool, ctx.user_id).await?;
    let devices = sessions
        .iter()
        .map(|s| DeviceSession::from_session(s, &ctx.token_hash))
        .collect();
    Ok(Json(DataResponse::new(devices)))
}

/// DELETE /api/v1/sessions/{id}
///
/// Destroy one of the caller's sessions. Sessions belonging to other users
/// are reported as missing, so ids cannot be probed across accounts.
pub async fn destroy_session(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let not_found = AppError::Security(SecurityError::NotFound {
        entity: "Session",
        id,
    });
    let Some(session) = SessionRepo::find_by_id(&state.pool, id).await? else {
        return Err(not_found);
    };
    if session.user_id != ctx.user_id {
        return Err(not_found);
    }
    SessionRepo::destroy(&state.pool, id, actions::FORCED_LOGOUT).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/revoke-others
///
/// Destroy every other active session of the calling user.
pub async fn revoke_others(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
) -> AppResult<Json<DataResponse<RevokedCount>>> {
    let revoked =
        SessionRepo::destroy_all_for_user(&state.pool, ctx.user_id, Some(&ctx.token_hash)).await?;
    Ok(Json(DataResponse::new(RevokedCount { revoked })))
}

/// GET /api/v1/sessions/idle-timeout
pub async fn get_idle_timeout(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
) -> AppResult<Json<DataResponse<IdleTimeoutSetting>>> {
    let Some(current) = UserRepo::get_idle_timeout(&state.pool, ctx.user_id).await? else {
        return Err(AppError::Security(SecurityError::NotFound {
            entity: "User",
            id: ctx.user_id,
        }));
    };
    Ok(Json(DataResponse::new(IdleTimeoutSetting {
        idle_timeout_secs: i64::from(current),
    })))
}

/// PUT /api/v1/sessions/idle-timeout
///
/// Values outside [300, 3600] seconds are clamped, not rejected; the
/// response reports what was actually applied.
pub async fn set_idle_timeout(
    State(state): State<AppState>,
    AuthSession(ctx): AuthSession,
    Json(input): Json<UpdateIdleTimeout>,
) -> AppResult<Json<DataResponse<IdleTimeoutSetting>>> {
    let applied = clamp_idle_timeout(input.idle_timeout_secs);
    UserRepo::set_idle_timeout(&state.pool, ctx.user_id, applied as i32).await?;
    state
        .recorder
        .record(CreateAuditEvent {
            actor_user_id: Some(ctx.user_id),
            subject_type: subjects::USER.to_string(),
            subject_id: Some(ctx.user_id),
            action: actions::UPDATE.to_string(),
            description: "idle timeout preference changed".to_string(),
            details: Some(json!({
                "requested_secs": input.idle_timeout_secs,
                "applied_secs": applied,
            })),
            source_ip: None,
            user_agent: None,
        })
        .await;
    Ok(Json(DataResponse::new(IdleTimeoutSetting {
        idle_timeout_secs: applied,
    })))
}
