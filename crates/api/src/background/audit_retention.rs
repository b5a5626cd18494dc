//! Periodic enforcement of the audit retention window.
//!
//! Deletes unflagged audit events older than the configured retention
//! period and sweeps out expired one-time passcodes. Flagged events are
//! never deleted here; they stay until an auditor releases the hold.
//! Runs on a fixed interval using `tokio::time::interval`.

use std::time::Duration;

use chrono::Utc;
use medlock_db::repositories::audit_repo::AuditRepo;
use medlock_db::repositories::otp_repo::OtpRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the audit retention loop.
///
/// Deletes unflagged audit rows older than `retention_days` and OTP rows
/// whose expiry passed more than an hour ago. Runs until `cancel` is
/// triggered.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Audit retention job started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Audit retention job stopping");
                break;
            }
            _ = interval.tick() => {
                sweep(&pool, retention_days).await;
            }
        }
    }
}

async fn sweep(pool: &PgPool, retention_days: i64) {
    let audit_cutoff = Utc::now() - chrono::Duration::days(retention_days);
    match AuditRepo::delete_unflagged_before(pool, audit_cutoff).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Audit retention: purged expired events");
            } else {
                tracing::debug!("Audit retention: no events past the window");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Audit retention: sweep failed");
        }
    }

    // Consumed and expired codes are useless after the login window; keep
    // them one extra hour so replay rejections can still find the row.
    let otp_cutoff = Utc::now() - chrono::Duration::hours(1);
    match OtpRepo::delete_expired_before(pool, otp_cutoff).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::debug!(deleted, "Audit retention: dropped stale passcodes");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Audit retention: passcode sweep failed");
        }
    }
}
