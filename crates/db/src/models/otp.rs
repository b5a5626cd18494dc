//! One-time passcode model and DTOs.

use medlock_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A one-time passcode row.
#[derive(Debug, Clone, FromRow)]
pub struct OneTimePasscode {
    pub id: DbId,
    pub user_id: DbId,
    pub code: String,
    pub expires_at: Timestamp,
    pub consumed: bool,
    pub created_at: Timestamp,
}

/// DTO for issuing a new passcode.
pub struct CreateOtp {
    pub user_id: DbId,
    pub code: String,
    pub expires_at: Timestamp,
}
