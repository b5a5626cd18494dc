//! Request handlers, grouped by resource.

pub mod audit;
pub mod auth;
pub mod sessions;
