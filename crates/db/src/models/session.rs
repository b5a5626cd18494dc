//! Session model and DTOs.

use medlock_core::audit::mask_ip;
use medlock_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A session row from the `sessions` table.
///
/// Holds only digests of the token and CSRF value; the raw values never
/// reach this struct.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub csrf_token_hash: String,
    pub csrf_issued_at: Timestamp,
    pub fingerprint_hash: String,
    pub device_label: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub last_rotated_at: Timestamp,
    pub expires_at: Timestamp,
}

/// DTO for creating a new session row.
pub struct CreateSession {
    pub user_id: DbId,
    pub token_hash: String,
    pub csrf_token_hash: String,
    pub fingerprint_hash: String,
    pub device_label: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
}

/// Active-session view for the device-management surface.
///
/// The source IP is masked here, at construction, so no full address can
/// leak through serialization.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSession {
    pub id: DbId,
    pub device_label: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub last_activity_at: Timestamp,
    /// True for the session that made the listing request.
    pub current: bool,
}

impl DeviceSession {
    pub fn from_session(session: &Session, current_token_hash: &str) -> Self {
        Self {
            id: session.id,
            device_label: session.device_label.clone(),
            source_ip: session.source_ip.as_deref().map(mask_ip),
            user_agent: session.user_agent.clone(),
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            current: session.token_hash == current_token_hash,
        }
    }
}
