//! Pure session lifetime policy.
//!
//! Timeouts are evaluated lazily at validation time against timestamps the
//! store already holds. Nothing here touches a database or a clock; callers
//! pass `now` in so decisions are reproducible in tests.

use chrono::Duration;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Floor for the per-user idle timeout preference (5 minutes).
pub const MIN_IDLE_TIMEOUT_SECS: i64 = 300;

/// Ceiling for the per-user idle timeout preference (60 minutes).
pub const MAX_IDLE_TIMEOUT_SECS: i64 = 3600;

/// Idle timeout applied when the user has never set a preference (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 1800;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of evaluating a stored session against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    /// The session is live. `needs_rotation` is set when the rotation
    /// interval has elapsed since the token was last reissued.
    Active { needs_rotation: bool },
    /// The gap since `last_activity_at` exceeded the idle timeout.
    TimedOutIdle,
    /// The session reached its absolute lifetime ceiling.
    TimedOutAbsolute,
}

impl SessionVerdict {
    /// True for either timeout outcome.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOutIdle | Self::TimedOutAbsolute)
    }
}

// ---------------------------------------------------------------------------
// Policy functions
// ---------------------------------------------------------------------------

/// Clamp a requested idle timeout into the permitted range.
///
/// Requests outside `[MIN, MAX]` are pulled to the nearest bound rather than
/// rejected; the caller persists whatever this returns.
pub fn clamp_idle_timeout(requested_secs: i64) -> i64 {
    requested_secs.clamp(MIN_IDLE_TIMEOUT_SECS, MAX_IDLE_TIMEOUT_SECS)
}

/// Evaluate a session's stored timestamps against `now`.
///
/// The absolute ceiling is checked first: an idle verdict on a session that
/// is past its hard lifetime would understate the violation. Idle expiry is
/// strict (`elapsed > timeout`), so a request landing exactly at the limit
/// still passes. Timeout decisions are monotone in `now`; a session never
/// un-expires.
pub fn evaluate(
    now: Timestamp,
    last_activity_at: Timestamp,
    expires_at: Timestamp,
    last_rotated_at: Timestamp,
    idle_timeout_secs: i64,
    rotation_interval_secs: i64,
) -> SessionVerdict {
    if now >= expires_at {
        return SessionVerdict::TimedOutAbsolute;
    }

    let idle = now - last_activity_at;
    if idle > Duration::seconds(idle_timeout_secs) {
        return SessionVerdict::TimedOutIdle;
    }

    let needs_rotation = now - last_rotated_at >= Duration::seconds(rotation_interval_secs);
    SessionVerdict::Active { needs_rotation }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
