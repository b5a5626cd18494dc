//! The closed set of role names.
//!
//! Must match the CHECK constraint in `20260301000001_create_users_table.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CLINICIAN: &str = "clinician";
pub const ROLE_AUDITOR: &str = "auditor";

/// True when `role` is one of the known role names.
pub fn is_known_role(role: &str) -> bool {
    matches!(role, ROLE_ADMIN | ROLE_CLINICIAN | ROLE_AUDITOR)
}

/// True when `role` may read the audit ledger.
pub fn can_read_audit(role: &str) -> bool {
    matches!(role, ROLE_ADMIN | ROLE_AUDITOR)
}
