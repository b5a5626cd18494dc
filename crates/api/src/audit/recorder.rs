//! The audit write path.
//!
//! Every event passes through the redactor before it is persisted, no matter
//! which call site produced it. Callers choose between best-effort recording
//! (a failed write is logged and swallowed) and required recording (a failed
//! write is the caller's error), matching the two audit policies: secondary
//! logs never block their primary operation, while PHI reads must not
//! succeed unaudited.

use medlock_core::audit::subjects;
use medlock_core::error::SecurityError;
use medlock_core::redact::{redact_text, redact_value};
use medlock_core::types::DbId;
use medlock_db::models::audit::{AuditEvent, CreateAuditEvent};
use medlock_db::repositories::audit_repo::AuditRepo;
use sqlx::PgPool;

/// Redacting front door to the audit ledger.
#[derive(Clone)]
pub struct AuditRecorder {
    pool: PgPool,
}

impl AuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write an event, swallowing failure. The failure is logged locally
    /// with enough context to find it, never with the event details.
    pub async fn record(&self, entry: CreateAuditEvent) {
        let entry = sanitize(entry);
        if let Err(e) = AuditRepo::insert(&self.pool, &entry).await {
            tracing::warn!(
                error = %e,
                action = %entry.action,
                subject_type = %entry.subject_type,
                "Audit write failed; primary operation continues"
            );
        }
    }

    /// Write an event that the caller treats as a precondition for success.
    pub async fn record_required(
        &self,
        entry: CreateAuditEvent,
    ) -> Result<AuditEvent, SecurityError> {
        let entry = sanitize(entry);
        AuditRepo::insert(&self.pool, &entry)
            .await
            .map_err(|e| SecurityError::AuditWriteFailed(e.to_string()))
    }

    /// Record the precise cause of a rejection whose client-visible form is
    /// deliberately uniform. Always best-effort: a rejection must not turn
    /// into a 500 because the ledger hiccupped.
    pub async fn security_event(
        &self,
        action: &str,
        actor_user_id: Option<DbId>,
        details: serde_json::Value,
        source_ip: Option<String>,
        user_agent: Option<String>,
    ) {
        self.record(CreateAuditEvent {
            actor_user_id,
            subject_type: subjects::SECURITY.to_string(),
            subject_id: None,
            action: action.to_string(),
            description: String::new(),
            details: Some(details),
            source_ip,
            user_agent,
        })
        .await;
    }
}

/// Redact the free-text and structured parts of an entry before persisting.
fn sanitize(mut entry: CreateAuditEvent) -> CreateAuditEvent {
    entry.description = redact_text(&entry.description);
    entry.details = entry.details.as_ref().map(redact_value);
    entry
}
