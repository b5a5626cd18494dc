//! CSRF token verification policy.
//!
//! One active CSRF value exists per session; issuing a replacement
//! invalidates the previous value because only the newest hash is stored.
//! The raw value travels in an explicit response field and is echoed back in
//! a request header, never in the cookie, so a forged cross-site request
//! cannot supply it.

use chrono::Duration;

use crate::token;
use crate::types::Timestamp;

/// True when a CSRF token issued at `issued_at` is still inside its lifetime.
pub fn is_fresh(now: Timestamp, issued_at: Timestamp, lifetime_secs: i64) -> bool {
    now - issued_at < Duration::seconds(lifetime_secs)
}

/// Verify a submitted CSRF candidate against the stored hash.
///
/// Validates iff the candidate hashes to the stored value and the token is
/// inside its lifetime. The hash comparison always runs; freshness is
/// combined without short-circuiting.
pub fn verify(
    candidate: &str,
    stored_hash: &str,
    now: Timestamp,
    issued_at: Timestamp,
    lifetime_secs: i64,
) -> bool {
    let matches = token::constant_time_eq(&token::hash_token(candidate), stored_hash);
    matches & is_fresh(now, issued_at, lifetime_secs)
}
