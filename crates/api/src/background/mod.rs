//! Long-running jobs spawned beside the HTTP server.
//!
//! Every job is an async loop handed a [`tokio_util::sync::CancellationToken`];
//! shutdown cancels the token and awaits the join handle, so a sweep in
//! progress always runs to completion.

pub mod audit_retention;
