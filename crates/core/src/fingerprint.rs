//! Keyed client fingerprint computation.
//!
//! The fingerprint binds a session to the stable request headers the client
//! presented at login (User-Agent and Accept-Language). The client IP is
//! deliberately not an input: mobile clients change networks mid-session and
//! must not be forced out for it. Keying the digest with a server secret
//! means a reader of the session table cannot precompute fingerprints for
//! header pairs of their choosing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::hashing;
use crate::token;

type HmacSha256 = Hmac<Sha256>;

/// Compute the keyed fingerprint for a (User-Agent, Accept-Language) pair.
///
/// Returns a hex-encoded HMAC-SHA256. Missing headers are passed as empty
/// strings, which still yields a stable value for that client.
pub fn compute(key: &str, user_agent: &str, accept_language: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(user_agent.as_bytes());
    mac.update(b"\n");
    mac.update(accept_language.as_bytes());
    hashing::hex_encode(mac.finalize().into_bytes())
}

/// Check the current request headers against a stored fingerprint.
///
/// Constant-time compare: the stored fingerprint is derived from a server
/// secret and is treated with the same care as a token hash.
pub fn matches(key: &str, user_agent: &str, accept_language: &str, stored: &str) -> bool {
    token::constant_time_eq(&compute(key, user_agent, accept_language), stored)
}
