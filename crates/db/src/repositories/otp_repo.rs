//! Repository for the `one_time_passcodes` table.

use medlock_core::token;
use medlock_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::otp::{CreateOtp, OneTimePasscode};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, code, expires_at, consumed, created_at";

/// How many recent codes a verification attempt is checked against. Old
/// codes past this window behave as invalid, not as replayed.
const LOOKBACK: i64 = 5;

/// Outcome of verifying a submitted passcode.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpOutcome {
    /// The code matched a live row and this call consumed it.
    Consumed(DbId),
    /// The code matched a row that was already consumed. Distinct from
    /// `Invalid` so a replay is recognizable as one.
    AlreadyUsed,
    /// The code matched a row past its expiry.
    Expired,
    /// The code matched nothing on file.
    Invalid,
}

/// Provides issue/verify operations for one-time passcodes.
pub struct OtpRepo;

impl OtpRepo {
    /// Insert a new passcode, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateOtp) -> Result<OneTimePasscode, sqlx::Error> {
        let query = format!(
            "INSERT INTO one_time_passcodes (user_id, code, expires_at)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OneTimePasscode>(&query)
            .bind(input.user_id)
            .bind(&input.code)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Verify a submitted code for a user and consume it on success.
    ///
    /// The candidate is compared in Rust with constant-time equality against
    /// the user's recent codes; the database never sees `WHERE code = $1`,
    /// so no index comparison can become a timing oracle. Consumption is a
    /// conditional update: of two concurrent submissions of the same code,
    /// exactly one observes the transition and the other reports a replay.
    pub async fn verify_and_consume(
        pool: &PgPool,
        user_id: DbId,
        candidate: &str,
    ) -> Result<OtpOutcome, sqlx::Error> {
        let recent = Self::recent_for_user(pool, user_id, LOOKBACK).await?;

        // Scan every row; no early exit on match, so timing does not reveal
        // which position (if any) matched.
        let mut matched: Option<&OneTimePasscode> = None;
        for row in &recent {
            if token::constant_time_eq(&row.code, candidate) && matched.is_none() {
                matched = Some(row);
            }
        }

        let Some(row) = matched else {
            return Ok(OtpOutcome::Invalid);
        };
        if row.consumed {
            return Ok(OtpOutcome::AlreadyUsed);
        }
        if row.expires_at <= chrono::Utc::now() {
            return Ok(OtpOutcome::Expired);
        }

        let result = sqlx::query(
            "UPDATE one_time_passcodes SET consumed = true WHERE id = $1 AND consumed = false",
        )
        .bind(row.id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(OtpOutcome::Consumed(row.id))
        } else {
            // Lost the race to a concurrent submission of the same code.
            Ok(OtpOutcome::AlreadyUsed)
        }
    }

    /// The user's most recent codes, newest first.
    pub async fn recent_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<OneTimePasscode>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM one_time_passcodes
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, OneTimePasscode>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Housekeeping sweep: drop rows whose expiry is past `cutoff`.
    ///
    /// Run well behind the verification lookback so replay detection keeps
    /// its memory.
    pub async fn delete_expired_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM one_time_passcodes WHERE expires_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
