//! Session token and one-time passcode generation, hashing, and comparison.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the API layer and any future CLI or maintenance tooling. Raw token values
//! exist only in memory and in the response that delivers them to the client;
//! everything stored or logged is a hash or a masked form.

use rand::Rng;
use subtle::ConstantTimeEq;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a generated session or CSRF token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

/// Number of leading characters usable as a human-visible identifier.
pub const TOKEN_PREFIX_LENGTH: usize = 8;

/// Width of a generated one-time passcode (decimal digits).
pub const OTP_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Token generation
// ---------------------------------------------------------------------------

/// The result of generating a new session or CSRF token.
pub struct GeneratedToken {
    /// The raw token (sent to the client exactly once, never stored).
    pub plaintext: String,
    /// The first [`TOKEN_PREFIX_LENGTH`] characters, safe for logs and display.
    pub prefix: String,
    /// The SHA-256 hex digest of the raw token (the only form persisted).
    pub hash: String,
}

/// Generate a new random token.
///
/// Returns the raw value (delivered once), a display prefix, and the SHA-256
/// hash used for storage and lookup. The raw value must never be persisted.
pub fn generate_token() -> GeneratedToken {
    let raw: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();

    let prefix = raw[..TOKEN_PREFIX_LENGTH].to_string();
    let hash = hash_token(&raw);

    GeneratedToken {
        plaintext: raw,
        prefix,
        hash,
    }
}

/// Compute the SHA-256 hex digest of a raw token.
///
/// Used at issuance (to store the hash) and at validation (to look the
/// session up by hash). Deterministic by construction.
pub fn hash_token(raw: &str) -> String {
    crate::hashing::sha256_hex(raw.as_bytes())
}

/// Mask a raw token for display: prefix plus an ellipsis.
///
/// This is the only form of a raw token permitted in any log line.
pub fn mask_token(raw: &str) -> String {
    format!("{}...", &raw[..TOKEN_PREFIX_LENGTH.min(raw.len())])
}

// ---------------------------------------------------------------------------
// One-time passcodes
// ---------------------------------------------------------------------------

/// Generate a fixed-width numeric one-time passcode.
///
/// Each digit is drawn independently so the code is uniform over the full
/// `10^OTP_LENGTH` space; formatting a bounded integer would bias the
/// leading digit distribution under a non-power-of-ten cap.
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Constant-time equality over two strings.
///
/// Every comparison between a submitted secret (token, CSRF value, OTP code)
/// and a stored value goes through here; a short-circuiting `==` would leak
/// the length of the matching prefix through timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
