//! Security-domain primitives shared across the medlock workspace.
//!
//! Everything in this crate is pure computation over owned data: token and
//! passcode generation, fingerprinting, timeout policy, CSRF checks, and
//! redaction. No I/O, no database types, no framework types. The `db` and
//! `api` crates depend on this crate, never the reverse.

pub mod audit;
pub mod csrf;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod redact;
pub mod roles;
pub mod session_policy;
pub mod token;
pub mod types;
