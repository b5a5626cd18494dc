//! Audit event entity models and DTOs.
//!
//! Audit events are immutable once written except the `flagged` bit, so
//! there is no update DTO and no `updated_at` field.

use medlock_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single audit event row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: DbId,
    pub actor_user_id: Option<DbId>,
    pub subject_type: String,
    pub subject_id: Option<DbId>,
    pub action: String,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub flagged: bool,
    pub occurred_at: Timestamp,
}

/// DTO for inserting a new audit event.
///
/// `details` must already be redacted by the caller; the repository performs
/// no redaction of its own.
#[derive(Debug, Clone)]
pub struct CreateAuditEvent {
    pub actor_user_id: Option<DbId>,
    pub subject_type: String,
    pub subject_id: Option<DbId>,
    pub action: String,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Filter parameters for querying audit events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor_user_id: Option<DbId>,
    pub subject_type: Option<String>,
    pub subject_id: Option<DbId>,
    pub action: Option<String>,
    pub flagged: Option<bool>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    /// Free-text match against the description and details.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQuery {
    /// Page size after defaulting and clamping to [1, 500].
    pub fn applied_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    /// Offset after defaulting; negative values collapse to zero.
    pub fn applied_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
