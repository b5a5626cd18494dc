//! API error types and HTTP response mapping.
//!
//! Every failure leaving a handler funnels through [`AppError`], which
//! controls three things:
//!
//! - which HTTP status and `{error, code}` body the client sees;
//! - the collapse of all session-stage failures into one uniform 401, so
//!   the response never distinguishes a missing session from an expired or
//!   hijacked one (the precise cause lives in the security-event ledger);
//! - redaction of any free-form detail before it is logged, and suppression
//!   of that detail in the response unless debug errors are enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medlock_core::error::SecurityError;
use medlock_core::redact::{redact_error, redact_text};
use serde_json::json;

/// Client-visible message for the uniform authentication rejection.
pub const UNIFORM_REJECTION_MESSAGE: &str = "Authentication required";

/// Result alias used by all handlers.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Credential-stage rejection (bad username/password). Distinct from the
    /// session-stage uniform rejection.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Debug-mode switch
// ---------------------------------------------------------------------------

static DEBUG_ERRORS: AtomicBool = AtomicBool::new(false);

/// Enable or disable detail in 5xx responses. Called once at bootstrap with
/// the configured value; responses outside debug mode carry only the generic
/// status message.
pub fn set_debug_errors(enabled: bool) {
    DEBUG_ERRORS.store(enabled, Ordering::Relaxed);
}

fn debug_errors() -> bool {
    DEBUG_ERRORS.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Panic hook
// ---------------------------------------------------------------------------

static PANIC_HOOK: Once = Once::new();

/// Install the process-wide panic hook. Idempotent; the second and later
/// calls are no-ops.
///
/// The hook replaces the default stderr printer so the raw panic payload is
/// never written anywhere; the payload is redacted first and emitted through
/// `tracing`. Client-facing panic handling is the catch-panic layer, which
/// returns a generic 500 with no payload at all.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::error!(
                panic = %redact_text(&payload),
                %location,
                "Unhandled panic"
            );
        }));
    });
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

impl AppError {
    /// Map this error to (status, client message, stable error code).
    ///
    /// 5xx detail is replaced with a generic message unless debug errors are
    /// on, in which case the redacted detail is returned instead.
    fn response_parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::Security(err) if err.is_uniform_rejection() => (
                StatusCode::UNAUTHORIZED,
                UNIFORM_REJECTION_MESSAGE.to_string(),
                "AUTH_REQUIRED",
            ),
            AppError::Security(SecurityError::OtpInvalid) => (
                StatusCode::UNAUTHORIZED,
                "The code is not valid".to_string(),
                "OTP_INVALID",
            ),
            AppError::Security(SecurityError::OtpAlreadyUsed) => (
                StatusCode::UNAUTHORIZED,
                "This code has already been used".to_string(),
                "OTP_ALREADY_USED",
            ),
            AppError::Security(SecurityError::OtpExpired) => (
                StatusCode::UNAUTHORIZED,
                "This code has expired".to_string(),
                "OTP_EXPIRED",
            ),
            AppError::Security(SecurityError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                format!("{entity} with id {id} not found"),
                "NOT_FOUND",
            ),
            AppError::Security(SecurityError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::Security(SecurityError::Conflict(msg)) => {
                (StatusCode::CONFLICT, msg.clone(), "CONFLICT")
            }
            AppError::Security(SecurityError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, msg.clone(), "FORBIDDEN")
            }
            AppError::Security(SecurityError::AuditWriteFailed(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                sanitized_detail(detail),
                "AUDIT_WRITE_FAILED",
            ),
            AppError::Security(SecurityError::Internal(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                sanitized_detail(detail),
                "INTERNAL_ERROR",
            ),
            // is_uniform_rejection covered the remaining Security variants.
            AppError::Security(_) => (
                StatusCode::UNAUTHORIZED,
                UNIFORM_REJECTION_MESSAGE.to_string(),
                "AUTH_REQUIRED",
            ),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, msg.clone(), "UNAUTHORIZED")
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "BAD_REQUEST"),
            AppError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                sanitized_detail(detail),
                "INTERNAL_ERROR",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, code) = self.response_parts();
        if status.is_server_error() {
            // Database errors wrap a driver chain; flatten it so the root
            // cause is logged too, redacted like everything else.
            let detail = match &self {
                AppError::Database(err) => redact_error(err),
                other => redact_text(&other.to_string()),
            };
            tracing::error!(code, error = %detail, "Request failed");
        }
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// 5xx detail shown to the client: generic outside debug mode, redacted
/// detail inside it.
fn sanitized_detail(detail: &str) -> String {
    if debug_errors() {
        redact_text(detail)
    } else {
        "Internal server error".to_string()
    }
}

/// Map a raw sqlx error to HTTP response parts.
///
/// - `RowNotFound` -> 404
/// - unique violation on a `uq_`-prefixed constraint -> 409
/// - everything else -> 500 with the detail sanitized
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String, &'static str) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "Resource not found".to_string(),
            "NOT_FOUND",
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("");
            if constraint.starts_with("uq_") {
                (
                    StatusCode::CONFLICT,
                    "A conflicting record already exists".to_string(),
                    "CONFLICT",
                )
            } else {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sanitized_detail(&db_err.to_string()),
                    "INTERNAL_ERROR",
                )
            }
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            sanitized_detail(&other.to_string()),
            "INTERNAL_ERROR",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medlock_core::error::ExpiryCause;

    #[test]
    fn uniform_rejections_share_one_shape() {
        let causes = [
            AppError::Security(SecurityError::AuthenticationRequired),
            AppError::Security(SecurityError::SessionExpired(ExpiryCause::Idle)),
            AppError::Security(SecurityError::SessionExpired(ExpiryCause::Absolute)),
            AppError::Security(SecurityError::HijackSuspected),
            AppError::Security(SecurityError::CsrfInvalid),
        ];
        for err in causes {
            let (status, message, code) = err.response_parts();
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, UNIFORM_REJECTION_MESSAGE);
            assert_eq!(code, "AUTH_REQUIRED");
        }
    }

    #[test]
    fn otp_rejections_stay_distinct() {
        let (_, _, invalid) =
            AppError::Security(SecurityError::OtpInvalid).response_parts();
        let (_, _, replayed) =
            AppError::Security(SecurityError::OtpAlreadyUsed).response_parts();
        let (_, _, expired) =
            AppError::Security(SecurityError::OtpExpired).response_parts();
        assert_eq!(invalid, "OTP_INVALID");
        assert_eq!(replayed, "OTP_ALREADY_USED");
        assert_eq!(expired, "OTP_EXPIRED");
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = AppError::Security(SecurityError::NotFound {
            entity: "Session",
            id: 7,
        });
        let (status, message, code) = err.response_parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Session with id 7 not found");
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn internal_detail_is_suppressed_outside_debug_mode() {
        let err = AppError::Internal("connect to db-host-internal:5432 refused".to_string());
        let (status, message, _) = err.response_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let (status, _, code) = classify_sqlx_error(&sqlx::Error::RowNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }
}
