//! User entity model and DTOs.

use medlock_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A complete `users` row.
///
/// Carries the password hash and so must never cross the API boundary;
/// responses use [`UserResponse`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub idle_timeout_secs: i32,
    pub failed_login_count: i32,
    pub locked_until: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The user as responses show it: everything but the credential fields.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub role: String,
    pub idle_timeout_secs: i32,
    pub last_login_at: Option<Timestamp>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            idle_timeout_secs: user.idle_timeout_secs,
            last_login_at: user.last_login_at,
        }
    }
}

/// DTO for creating a new user.
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}
