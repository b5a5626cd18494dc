//! Server configuration loaded from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SERVER_HOST` | `127.0.0.1` | Bind address |
//! | `SERVER_PORT` | `8080` | Bind port |
//! | `CORS_ORIGINS` | `http://localhost:5173` | Comma-separated allowed origins |
//! | `REQUEST_TIMEOUT_SECS` | `30` | Per-request timeout |
//! | `SHUTDOWN_TIMEOUT_SECS` | `30` | Grace period for in-flight requests on shutdown |
//! | `FINGERPRINT_KEY` | (required) | HMAC key for session fingerprints |
//! | `SESSION_ABSOLUTE_LIFETIME_SECS` | `43200` | Hard ceiling on session age (12 h) |
//! | `SESSION_ROTATION_INTERVAL_SECS` | `900` | Token rotation interval |
//! | `CSRF_LIFETIME_SECS` | `3600` | Maximum age of an issued CSRF token |
//! | `OTP_LIFETIME_SECS` | `300` | One-time passcode validity window |
//! | `LOGIN_MAX_FAILED_ATTEMPTS` | `5` | Failed attempts before lockout |
//! | `LOGIN_LOCK_DURATION_MINS` | `15` | Lockout duration |
//! | `AUDIT_RETENTION_DAYS` | `2555` | Unflagged audit rows older than this are purged |
//! | `PHI_AUDIT_REQUIRED` | `true` | Fail PHI reads whose audit write fails |
//! | `DEBUG_ERRORS` | `false` | Include redacted detail in error responses |

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub security: SecurityConfig,
}

/// Session, CSRF, OTP, lockout, and audit policy knobs.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// HMAC key for request fingerprints. Required; there is no safe default.
    pub fingerprint_key: String,
    pub session_absolute_lifetime_secs: i64,
    pub session_rotation_interval_secs: i64,
    pub csrf_lifetime_secs: i64,
    pub otp_lifetime_secs: i64,
    pub max_failed_logins: i32,
    pub lock_duration_mins: i64,
    pub audit_retention_days: i64,
    /// When true, a failed audit write on a PHI-view path fails the response.
    pub phi_audit_required: bool,
    /// When true, error responses carry redacted detail instead of the
    /// generic status message. Never enable in production.
    pub debug_errors: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables, applying defaults.
    ///
    /// Panics when a variable is present but unparseable, or when
    /// `FINGERPRINT_KEY` is missing. Misconfiguration should stop the
    /// process before it binds a socket.
    pub fn from_env() -> Self {
        Self {
            host: env_or("SERVER_HOST", "127.0.0.1"),
            port: parse_env("SERVER_PORT", 8080),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:5173")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30),
            security: SecurityConfig::from_env(),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        Self {
            fingerprint_key: std::env::var("FINGERPRINT_KEY")
                .expect("FINGERPRINT_KEY must be set"),
            session_absolute_lifetime_secs: parse_env("SESSION_ABSOLUTE_LIFETIME_SECS", 43_200),
            session_rotation_interval_secs: parse_env("SESSION_ROTATION_INTERVAL_SECS", 900),
            csrf_lifetime_secs: parse_env("CSRF_LIFETIME_SECS", 3600),
            otp_lifetime_secs: parse_env("OTP_LIFETIME_SECS", 300),
            max_failed_logins: parse_env("LOGIN_MAX_FAILED_ATTEMPTS", 5),
            lock_duration_mins: parse_env("LOGIN_LOCK_DURATION_MINS", 15),
            audit_retention_days: parse_env("AUDIT_RETENTION_DAYS", 2555),
            phi_audit_required: parse_env("PHI_AUDIT_REQUIRED", true),
            debug_errors: parse_env("DEBUG_ERRORS", false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} is not valid: {e}")),
        Err(_) => default,
    }
}
