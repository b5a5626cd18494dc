//! Audit vocabulary and mapping helpers.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the API layer and any future reporting or maintenance tooling. The
//! constants here are the closed vocabulary for `audit_events.action` and
//! `audit_events.subject_type`; free-form action strings do not enter the
//! ledger.

// ---------------------------------------------------------------------------
// Action constants
// ---------------------------------------------------------------------------

/// Known actions for audit events.
pub mod actions {
    pub const VIEW: &str = "view";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const SEARCH: &str = "search";
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const TIMEOUT: &str = "timeout";
    pub const FORCED_LOGOUT: &str = "forced_logout";
    pub const HIJACK_DESTROYED: &str = "hijack_destroyed";
    pub const ROTATION: &str = "rotation";
    pub const OTP_ISSUED: &str = "otp_issued";
}

// ---------------------------------------------------------------------------
// Security-event action constants
// ---------------------------------------------------------------------------

/// Actions for internal security events. These record the precise cause of
/// a rejection whose client-visible form is deliberately uniform.
pub mod security_events {
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const ACCOUNT_LOCKED: &str = "account_locked";
    pub const SESSION_MISSING: &str = "session_missing";
    pub const SESSION_EXPIRED_IDLE: &str = "session_expired_idle";
    pub const SESSION_EXPIRED_ABSOLUTE: &str = "session_expired_absolute";
    pub const FINGERPRINT_MISMATCH: &str = "fingerprint_mismatch";
    pub const CSRF_REJECTED: &str = "csrf_rejected";
    pub const OTP_INVALID: &str = "otp_invalid";
    pub const OTP_REPLAYED: &str = "otp_replayed";
    pub const OTP_EXPIRED: &str = "otp_expired";
}

// ---------------------------------------------------------------------------
// Subject type constants
// ---------------------------------------------------------------------------

/// Known subject types for audit events.
pub mod subjects {
    pub const PATIENT: &str = "patient";
    pub const RECORD: &str = "record";
    pub const USER: &str = "user";
    pub const SESSION: &str = "session";
    pub const SECURITY: &str = "security";
    pub const SYSTEM: &str = "system";
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Map an HTTP method to the audit action it implies.
///
/// Unknown or read-like methods map to `view`; the middleware only audits
/// routes it has classified, so this default cannot invent write actions.
pub fn action_for_method(method: &str) -> &'static str {
    match method {
        "POST" => actions::CREATE,
        "PUT" | "PATCH" => actions::UPDATE,
        "DELETE" => actions::DELETE,
        _ => actions::VIEW,
    }
}

/// True when a subject type denotes regulated personal data.
///
/// Events against these subjects are PHI accesses: the audit write is a
/// precondition for a successful response on paths that read them.
pub fn is_phi_subject(subject_type: &str) -> bool {
    matches!(subject_type, subjects::PATIENT | subjects::RECORD)
}

/// Mask an IP address for display surfaces.
///
/// Keeps the network half and hides the host half: IPv4 keeps two octets,
/// IPv6 keeps the first two groups. Unparseable input is fully masked.
pub fn mask_ip(ip: &str) -> String {
    let v4: Vec<&str> = ip.split('.').collect();
    if v4.len() == 4 {
        return format!("{}.{}.x.x", v4[0], v4[1]);
    }
    if ip.contains(':') {
        let groups: Vec<&str> = ip.split(':').collect();
        if groups.len() >= 2 {
            return format!("{}:{}::x", groups[0], groups[1]);
        }
    }
    "x.x.x.x".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
