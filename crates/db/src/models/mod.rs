//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A create DTO for inserts
//! - Any query-parameter or display types the entity needs

pub mod audit;
pub mod otp;
pub mod session;
pub mod user;
