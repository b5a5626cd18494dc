//! Repository for the `sessions` table.
//!
//! Sessions are looked up only by token hash or id, never by raw token.
//! Mutating calls log a session-activity record (login/logout/timeout/
//! forced_logout) best-effort: a failure to write that secondary record is
//! logged locally and never blocks or rolls back the primary operation.

use medlock_core::audit::{actions, subjects};
use medlock_core::error::ExpiryCause;
use medlock_core::session_policy::{self, SessionVerdict};
use medlock_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::CreateAuditEvent;
use crate::models::session::{CreateSession, Session};
use crate::repositories::audit_repo::AuditRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, user_id, token_hash, csrf_token_hash, csrf_issued_at, fingerprint_hash, \
    device_label, source_ip, user_agent, is_active, created_at, \
    last_activity_at, last_rotated_at, expires_at";

/// Outcome of a timeout-aware session lookup.
#[derive(Debug)]
pub enum SessionValidation {
    /// The session is live; the caller owns the single activity touch and
    /// any due rotation.
    Valid {
        session: Session,
        role: String,
        idle_timeout_secs: i64,
        needs_rotation: bool,
    },
    /// No active session holds this token hash.
    NotFound,
    /// A limit was exceeded; the row has already been deactivated.
    TimedOut { session: Session, cause: ExpiryCause },
}

/// Provides lifecycle operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (user_id, token_hash, csrf_token_hash, fingerprint_hash,
                                   device_label, source_ip, user_agent, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(&input.csrf_token_hash)
            .bind(&input.fingerprint_hash)
            .bind(&input.device_label)
            .bind(&input.source_ip)
            .bind(&input.user_agent)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await?;

        log_session_activity(pool, &session, actions::LOGIN, "session started").await;
        Ok(session)
    }

    /// Find an active session by its token hash.
    ///
    /// Liveness flag only; timeout evaluation belongs to [`Self::validate`].
    pub async fn find_active_by_token_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions WHERE token_hash = $1 AND is_active = true"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Find a session by id, active or not.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Timeout-aware lookup: the validation step of the request guard.
    ///
    /// Evaluates the idle limit (per-user preference, clamped) and the
    /// absolute ceiling lazily against the stored timestamps. A violated
    /// limit deactivates the row here and now; no background eviction
    /// exists. Does NOT touch `last_activity_at`: the caller updates
    /// activity exactly once per validated request.
    pub async fn validate(
        pool: &PgPool,
        token_hash: &str,
        rotation_interval_secs: i64,
    ) -> Result<SessionValidation, sqlx::Error> {
        let Some(session) = Self::find_active_by_token_hash(pool, token_hash).await? else {
            return Ok(SessionValidation::NotFound);
        };

        let user = sqlx::query_as::<_, (String, i32, bool)>(
            "SELECT role, idle_timeout_secs, is_active FROM users WHERE id = $1",
        )
        .bind(session.user_id)
        .fetch_optional(pool)
        .await?;

        let Some((role, idle_pref, user_active)) = user else {
            return Ok(SessionValidation::NotFound);
        };
        if !user_active {
            // A deactivated account takes its sessions with it.
            Self::destroy(pool, session.id, actions::FORCED_LOGOUT).await?;
            return Ok(SessionValidation::NotFound);
        }

        let idle_timeout_secs = session_policy::clamp_idle_timeout(i64::from(idle_pref));
        let now = chrono::Utc::now();
        let verdict = session_policy::evaluate(
            now,
            session.last_activity_at,
            session.expires_at,
            session.last_rotated_at,
            idle_timeout_secs,
            rotation_interval_secs,
        );

        match verdict {
            SessionVerdict::Active { needs_rotation } => Ok(SessionValidation::Valid {
                session,
                role,
                idle_timeout_secs,
                needs_rotation,
            }),
            SessionVerdict::TimedOutIdle => {
                Self::deactivate_timed_out(pool, &session).await?;
                Ok(SessionValidation::TimedOut { session, cause: ExpiryCause::Idle })
            }
            SessionVerdict::TimedOutAbsolute => {
                Self::deactivate_timed_out(pool, &session).await?;
                Ok(SessionValidation::TimedOut { session, cause: ExpiryCause::Absolute })
            }
        }
    }

    /// Update the activity timestamp. Concurrent calls race harmlessly;
    /// last write wins. Returns `false` once the session is inactive.
    pub async fn touch_activity(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET last_activity_at = NOW() WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically swap the token hash, keyed by the pre-rotation hash.
    ///
    /// Exactly one of any set of concurrent attempts succeeds; a loser
    /// observes `false` (zero rows) and must adopt the winner's token by
    /// continuing with its current cookie unchanged. Never retried blindly,
    /// or a session could double-rotate.
    pub async fn rotate_token(
        pool: &PgPool,
        pre_rotation_hash: &str,
        new_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET token_hash = $2, last_rotated_at = NOW()
             WHERE token_hash = $1 AND is_active = true",
        )
        .bind(pre_rotation_hash)
        .bind(new_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the CSRF hash for a session. The previous value is
    /// invalidated by being overwritten; only one CSRF token is ever live.
    pub async fn rotate_csrf(
        pool: &PgPool,
        id: DbId,
        new_csrf_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET csrf_token_hash = $2, csrf_issued_at = NOW()
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .bind(new_csrf_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// End a single session. `action` is the activity record to write,
    /// one of [`actions::LOGOUT`], [`actions::FORCED_LOGOUT`] or
    /// [`actions::HIJACK_DESTROYED`]. Returns `true` if the row was live.
    pub async fn destroy(pool: &PgPool, id: DbId, action: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE sessions SET is_active = false
             WHERE id = $1 AND is_active = true
             RETURNING {COLUMNS}"
        );
        let ended = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match ended {
            Some(session) => {
                log_session_activity(pool, &session, action, "session ended").await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// End every active session for a user, optionally sparing the one
    /// holding `except_token_hash`. Returns the number of sessions ended.
    pub async fn destroy_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        except_token_hash: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = match except_token_hash {
            Some(hash) => {
                sqlx::query(
                    "UPDATE sessions SET is_active = false
                     WHERE user_id = $1 AND is_active = true AND token_hash <> $2",
                )
                .bind(user_id)
                .bind(hash)
                .execute(pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE sessions SET is_active = false
                     WHERE user_id = $1 AND is_active = true",
                )
                .bind(user_id)
                .execute(pool)
                .await?
            }
        };

        let revoked = result.rows_affected();
        if revoked > 0 {
            let entry = CreateAuditEvent {
                actor_user_id: Some(user_id),
                subject_type: subjects::SESSION.to_string(),
                subject_id: None,
                action: actions::FORCED_LOGOUT.to_string(),
                description: "all other sessions revoked".to_string(),
                details: Some(serde_json::json!({ "revoked": revoked })),
                source_ip: None,
                user_agent: None,
            };
            if let Err(err) = AuditRepo::insert(pool, &entry).await {
                tracing::warn!(error = %err, "session activity record failed");
            }
        }
        Ok(revoked)
    }

    /// All active sessions for a user, most recently used first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE user_id = $1 AND is_active = true
             ORDER BY last_activity_at DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Deactivate a session the policy evaluation found expired.
    async fn deactivate_timed_out(pool: &PgPool, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET is_active = false WHERE id = $1 AND is_active = true")
            .bind(session.id)
            .execute(pool)
            .await?;
        log_session_activity(pool, session, actions::TIMEOUT, "session timed out").await;
        Ok(())
    }
}

/// Write a best-effort session-activity record. Failures are logged locally
/// and swallowed: the primary session operation has already succeeded and
/// must not be rolled back for its shadow.
async fn log_session_activity(pool: &PgPool, session: &Session, action: &str, description: &str) {
    let entry = CreateAuditEvent {
        actor_user_id: Some(session.user_id),
        subject_type: subjects::SESSION.to_string(),
        subject_id: Some(session.id),
        action: action.to_string(),
        description: description.to_string(),
        details: None,
        source_ip: session.source_ip.clone(),
        user_agent: session.user_agent.clone(),
    };
    if let Err(err) = AuditRepo::insert(pool, &entry).await {
        tracing::warn!(error = %err, action, session_id = session.id, "session activity record failed");
    }
}
