//! Shared helpers for HTTP-level integration tests.
//!
//! Every test drives the real router from [`build_app_router`], so requests
//! pass through the same middleware stack (session guard, CSRF check, audit
//! access recorder, panic recovery) that production uses.

use axum::body::Body;
use axum::http::header;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use medlock_api::auth::password::hash_password;
use medlock_api::config::{SecurityConfig, ServerConfig};
use medlock_api::router::build_app_router;
use medlock_api::state::AppState;
use medlock_db::models::user::{CreateUser, User};
use medlock_db::repositories::user_repo::UserRepo;

/// Password used for every user the helpers create.
pub const TEST_PASSWORD: &str = "Correct-Horse-Battery-9";

/// Fixed client identity headers. The session fingerprint is computed from
/// these at login, so authed helpers must keep sending the same values.
pub const TEST_UA: &str = "medlock-tests/1.0";
pub const TEST_LANG: &str = "en-US";

/// Build a test `ServerConfig` with safe defaults and a fixed fingerprint
/// key.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        security: SecurityConfig {
            fingerprint_key: "integration-test-fingerprint-key".to_string(),
            session_absolute_lifetime_secs: 43_200,
            session_rotation_interval_secs: 900,
            csrf_lifetime_secs: 3600,
            otp_lifetime_secs: 300,
            max_failed_logins: 5,
            lock_duration_mins: 15,
            audit_retention_days: 2555,
            phi_audit_required: true,
            debug_errors: false,
        },
    }
}

/// Build the full application router over the given pool, exactly as
/// `main.rs` does.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState::new(pool, config.clone());
    build_app_router(state, &config)
}

/// An authenticated client: the raw session token (cookie value) and the
/// matching CSRF token.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub token: String,
    pub csrf: String,
}

impl ClientSession {
    pub fn cookie(&self) -> String {
        format!("medlock_session={}", self.token)
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a fully built request through the router.
pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

fn base_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, TEST_UA)
        .header(header::ACCEPT_LANGUAGE, TEST_LANG)
}

/// GET without a session.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = base_request("GET", uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

/// POST a JSON body without a session.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = base_request("POST", uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, request).await
}

/// GET with the session cookie attached.
pub async fn get_authed(app: Router, uri: &str, session: &ClientSession) -> Response<Body> {
    let request = base_request("GET", uri)
        .header(header::COOKIE, session.cookie())
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

/// POST a JSON body with the session cookie and CSRF header attached.
pub async fn post_json_authed(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    session: &ClientSession,
) -> Response<Body> {
    write_json_authed(app, "POST", uri, body, session).await
}

/// PUT a JSON body with the session cookie and CSRF header attached.
pub async fn put_json_authed(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    session: &ClientSession,
) -> Response<Body> {
    write_json_authed(app, "PUT", uri, body, session).await
}

async fn write_json_authed(
    app: Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
    session: &ClientSession,
) -> Response<Body> {
    let request = base_request(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, session.cookie())
        .header("x-csrf-token", &session.csrf)
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, request).await
}

/// DELETE with the session cookie and CSRF header attached.
pub async fn delete_authed(app: Router, uri: &str, session: &ClientSession) -> Response<Body> {
    let request = base_request("DELETE", uri)
        .header(header::COOKIE, session.cookie())
        .header("x-csrf-token", &session.csrf)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create a user directly in the database with [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, username: &str, role: &str) -> User {
    let input = CreateUser {
        username: username.to_string(),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        role: role.to_string(),
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Read the latest passcode issued for a user straight from the table. The
/// API never returns codes, so tests fetch them the way the delivery
/// channel would.
pub async fn latest_otp(pool: &PgPool, user_id: i64) -> String {
    sqlx::query_scalar(
        "SELECT code FROM one_time_passcodes WHERE user_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("an issued passcode should exist")
}

/// Complete both login steps for a user created via [`create_user`] and
/// return the resulting client session.
pub async fn login(pool: &PgPool, username: &str) -> ClientSession {
    let body = serde_json::json!({ "username": username, "password": TEST_PASSWORD });
    let response = post_json(build_test_app(pool.clone()), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK, "password step should pass");

    let user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(pool)
        .await
        .expect("user should exist");
    let code = latest_otp(pool, user_id).await;

    let body = serde_json::json!({ "username": username, "code": code });
    let response = post_json(build_test_app(pool.clone()), "/api/v1/auth/verify-otp", body).await;
    assert_eq!(response.status(), StatusCode::OK, "OTP step should pass");
    session_from_response(response).await
}

/// Extract the session cookie and CSRF token from a successful
/// `/auth/verify-otp` response.
pub async fn session_from_response(response: Response<Body>) -> ClientSession {
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set the session cookie")
        .to_str()
        .expect("cookie should be ASCII")
        .to_string();
    let token = cookie
        .strip_prefix("medlock_session=")
        .expect("cookie name should match")
        .split(';')
        .next()
        .expect("cookie should have a value")
        .to_string();

    let json = body_json(response).await;
    let csrf = json["data"]["csrf_token"]
        .as_str()
        .expect("body should carry the CSRF token")
        .to_string();

    ClientSession { token, csrf }
}

/// Count audit events matching an action, optionally narrowed to an actor.
pub async fn count_events(pool: &PgPool, action: &str, actor: Option<i64>) -> i64 {
    match actor {
        Some(user_id) => sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM audit_events WHERE action = $1 AND actor_user_id = $2",
        )
        .bind(action)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count should succeed"),
        None => sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM audit_events WHERE action = $1",
        )
        .bind(action)
        .fetch_one(pool)
        .await
        .expect("count should succeed"),
    }
}
