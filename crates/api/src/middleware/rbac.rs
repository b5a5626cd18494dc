//! Role gates over the validated session.
//!
//! Each extractor wraps [`AuthSession`] and rejects with 403 when the
//! session's role is not sufficient. Using them as handler parameters keeps
//! the authorization requirement visible in the route signature.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use medlock_core::error::SecurityError;
use medlock_core::roles::{can_read_audit, ROLE_ADMIN};

use super::session::{AuthSession, SessionContext};
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `admin` role.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(ctx): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub SessionContext);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthSession(ctx) = AuthSession::from_request_parts(parts, state).await?;
        if ctx.role != ROLE_ADMIN {
            return Err(AppError::Security(SecurityError::Forbidden(
                "Admin role required".into(),
            )));
        }
        Ok(RequireAdmin(ctx))
    }
}

/// Requires `auditor` or `admin`: the roles allowed to read the audit trail.
pub struct RequireAuditor(pub SessionContext);

impl FromRequestParts<AppState> for RequireAuditor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthSession(ctx) = AuthSession::from_request_parts(parts, state).await?;
        if !can_read_audit(&ctx.role) {
            return Err(AppError::Security(SecurityError::Forbidden(
                "Auditor or Admin role required".into(),
            )));
        }
        Ok(RequireAuditor(ctx))
    }
}
