//! Audit trail services for the API layer.
//!
//! - [`recorder`] -- the write path: redact, then insert.
//! - [`access`] -- middleware that audits the compliance read surface.

pub mod access;
pub mod recorder;
