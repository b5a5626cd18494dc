//! Credential and transport primitives for the authentication flow.
//!
//! - [`password`] -- Argon2id hashing and verification of login passwords.
//! - [`cookie`] -- session cookie encoding and parsing.

pub mod cookie;
pub mod password;
