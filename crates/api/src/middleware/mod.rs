//! Session guard middleware and authorization extractors.
//!
//! - [`session::require_session`] -- validates the cookie-borne session on
//!   every protected route and owns activity updates and token rotation.
//! - [`session::AuthSession`] -- hands the validated [`session::SessionContext`]
//!   to handlers.
//! - [`rbac::RequireAdmin`] / [`rbac::RequireAuditor`] -- role gates over
//!   `AuthSession`.

pub mod rbac;
pub mod session;
