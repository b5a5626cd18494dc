//! Session cookie encoding and parsing.
//!
//! The cookie is the only place the raw session token travels. It is always
//! HttpOnly, Secure, SameSite=Strict, and scoped to the whole site; the
//! token value itself is alphanumeric, so no escaping is needed.

use axum::http::HeaderMap;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "medlock_session";

/// Build the `Set-Cookie` value that installs a session token.
pub fn build(token: &str, max_age_secs: i64) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age_secs}; HttpOnly; Secure; SameSite=Strict"
    )
}

/// Build the `Set-Cookie` value that removes the session cookie.
pub fn clear() -> String {
    format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Strict")
}

/// Extract the raw session token from the request `Cookie` header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}
