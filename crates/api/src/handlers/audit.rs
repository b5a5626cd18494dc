//! Handlers for the compliance read surface.
//!
//! All routes here require the auditor or admin role; the retention sweep
//! is admin only. Access to these routes is itself audited by the access
//! middleware layered over the router.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use medlock_core::error::SecurityError;
use medlock_core::types::{DbId, Timestamp};
use medlock_db::models::audit::{AuditEvent, AuditQuery};
use medlock_db::repositories::audit_repo::AuditRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuditor};
use crate::response::{DataResponse, PagedResponse};
use crate::state::AppState;

/// Plain page window for the fixed-filter views.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PhiAccessParams {
    /// Window size in days; defaults to 30.
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PhiAccessReport {
    pub patient_id: DbId,
    pub window_days: i64,
    pub events: Vec<AuditEvent>,
}

#[derive(Debug, Serialize)]
pub struct RetentionOutcome {
    pub deleted: u64,
    pub cutoff: Timestamp,
}

/// GET /api/v1/audit/events
///
/// Filtered, paginated listing; supports free-text search over the
/// description and details.
pub async fn list_events(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Query(params): Query<AuditQuery>,
) -> AppResult<Json<PagedResponse<AuditEvent>>> {
    let data = AuditRepo::query(&state.pool, &params).await?;
    let total = AuditRepo::count(&state.pool, &params).await?;
    Ok(Json(PagedResponse {
        data,
        total,
        limit: params.applied_limit(),
        offset: params.applied_offset(),
    }))
}

/// GET /api/v1/audit/subjects/{subject_type}/{subject_id}
///
/// Full trail for one subject, newest first.
pub async fn subject_trail(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Path((subject_type, subject_id)): Path<(String, DbId)>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<DataResponse<Vec<AuditEvent>>>> {
    let events = AuditRepo::subject_trail(
        &state.pool,
        &subject_type,
        subject_id,
        params.limit,
        params.offset,
    )
    .await?;
    Ok(Json(DataResponse::new(events)))
}

/// GET /api/v1/audit/actors/{id}
///
/// Everything one user did, newest first. Accepts the same filters as the
/// main listing; the actor filter is forced from the path.
pub async fn actor_trail(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Path(actor_id): Path<DbId>,
    Query(params): Query<AuditQuery>,
) -> AppResult<Json<PagedResponse<AuditEvent>>> {
    let params = AuditQuery {
        actor_user_id: Some(actor_id),
        ..params
    };
    let data = AuditRepo::query(&state.pool, &params).await?;
    let total = AuditRepo::count(&state.pool, &params).await?;
    Ok(Json(PagedResponse {
        data,
        total,
        limit: params.applied_limit(),
        offset: params.applied_offset(),
    }))
}

/// GET /api/v1/audit/flagged
///
/// Only events held for investigation.
pub async fn flagged_events(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Query(params): Query<AuditQuery>,
) -> AppResult<Json<PagedResponse<AuditEvent>>> {
    let params = AuditQuery {
        flagged: Some(true),
        ..params
    };
    let data = AuditRepo::query(&state.pool, &params).await?;
    let total = AuditRepo::count(&state.pool, &params).await?;
    Ok(Json(PagedResponse {
        data,
        total,
        limit: params.applied_limit(),
        offset: params.applied_offset(),
    }))
}

/// GET /api/v1/audit/security-events
///
/// Rolling view of recorded rejection causes and account-security activity.
pub async fn security_events(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Query(params): Query<PageParams>,
) -> AppResult<Json<DataResponse<Vec<AuditEvent>>>> {
    let events =
        AuditRepo::security_events(&state.pool, params.limit, params.offset).await?;
    Ok(Json(DataResponse::new(events)))
}

/// GET /api/v1/audit/phi-access/{patient_id}?days=N
///
/// Every recorded access touching one patient over the last N days.
pub async fn phi_access(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Path(patient_id): Path<DbId>,
    Query(params): Query<PhiAccessParams>,
) -> AppResult<Json<DataResponse<PhiAccessReport>>> {
    let window_days = params.days.unwrap_or(30).clamp(1, 3650);
    let cutoff = Utc::now() - Duration::days(window_days);
    let events = AuditRepo::phi_access_for_patient(
        &state.pool,
        patient_id,
        cutoff,
        params.limit,
        params.offset,
    )
    .await?;
    Ok(Json(DataResponse::new(PhiAccessReport {
        patient_id,
        window_days,
        events,
    })))
}

/// POST /api/v1/audit/events/{id}/flag
pub async fn flag_event(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    set_flag(&state, id, true).await
}

/// POST /api/v1/audit/events/{id}/unflag
pub async fn unflag_event(
    State(state): State<AppState>,
    RequireAuditor(_): RequireAuditor,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    set_flag(&state, id, false).await
}

async fn set_flag(state: &AppState, id: DbId, flagged: bool) -> AppResult<StatusCode> {
    let updated = AuditRepo::set_flagged(&state.pool, id, flagged).await?;
    if !updated {
        return Err(AppError::Security(SecurityError::NotFound {
            entity: "Audit event",
            id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/audit/retention/run
///
/// Admin-triggered retention sweep; flagged rows are always spared.
pub async fn run_retention(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> AppResult<Json<DataResponse<RetentionOutcome>>> {
    let cutoff = Utc::now() - Duration::days(state.config.security.audit_retention_days);
    let deleted = AuditRepo::delete_unflagged_before(&state.pool, cutoff).await?;
    tracing::info!(deleted, %cutoff, "Audit retention sweep (manual)");
    Ok(Json(DataResponse::new(RetentionOutcome { deleted, cutoff })))
}
