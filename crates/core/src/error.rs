//! Security-domain error taxonomy.
//!
//! The variants distinguish every cause the subsystem cares about
//! internally. Which of them collapse into the uniform client-visible
//! rejection is a property of the variant, not of the call site; see
//! [`SecurityError::is_uniform_rejection`].

use crate::audit::security_events;
use crate::types::DbId;

/// Which limit ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCause {
    Idle,
    Absolute,
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Session expired")]
    SessionExpired(ExpiryCause),

    #[error("Session fingerprint mismatch")]
    HijackSuspected,

    #[error("CSRF token missing, stale, or wrong")]
    CsrfInvalid,

    #[error("One-time passcode invalid")]
    OtpInvalid,

    #[error("One-time passcode already used")]
    OtpAlreadyUsed,

    #[error("One-time passcode expired")]
    OtpExpired,

    #[error("Audit write failed: {0}")]
    AuditWriteFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// True for failures that must reach the client as the single uniform
    /// authentication rejection. The precise cause stays server-side as a
    /// security event.
    pub fn is_uniform_rejection(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired
                | Self::SessionExpired(_)
                | Self::HijackSuspected
                | Self::CsrfInvalid
        )
    }

    /// Security-event action recording the precise cause of a rejection,
    /// for variants that have one.
    pub fn security_event_action(&self) -> Option<&'static str> {
        match self {
            Self::AuthenticationRequired => Some(security_events::SESSION_MISSING),
            Self::SessionExpired(ExpiryCause::Idle) => {
                Some(security_events::SESSION_EXPIRED_IDLE)
            }
            Self::SessionExpired(ExpiryCause::Absolute) => {
                Some(security_events::SESSION_EXPIRED_ABSOLUTE)
            }
            Self::HijackSuspected => Some(security_events::FINGERPRINT_MISMATCH),
            Self::CsrfInvalid => Some(security_events::CSRF_REJECTED),
            Self::OtpInvalid => Some(security_events::OTP_INVALID),
            Self::OtpAlreadyUsed => Some(security_events::OTP_REPLAYED),
            Self::OtpExpired => Some(security_events::OTP_EXPIRED),
            _ => None,
        }
    }
}
