//! SHA-256 digest and hex helpers.
//!
//! The `token` and `fingerprint` modules both digest through here, so the
//! hash construction exists in exactly one place.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Lowercase hex rendering of arbitrary bytes, two chars per byte.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
