//! HTTP-level integration tests for the session guard and the device
//! management surface: uniform rejection, fingerprint pinning, timeouts,
//! CSRF enforcement, and token rotation.

mod common;

use axum::body::Body;
use axum::http::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT};
use axum::http::{Request, StatusCode};
use common::{
    body_json, create_user, delete_authed, get_authed, login, post_json_authed, put_json_authed,
    ClientSession, TEST_LANG, TEST_PASSWORD, TEST_UA,
};
use sqlx::PgPool;

async fn session_id_of(pool: &PgPool, session: &ClientSession) -> i64 {
    let hash = medlock_core::token::hash_token(&session.token);
    sqlx::query_scalar("SELECT id FROM sessions WHERE token_hash = $1")
        .bind(hash)
        .fetch_one(pool)
        .await
        .expect("session row should exist")
}

// ---------------------------------------------------------------------------
// Uniform rejection surface
// ---------------------------------------------------------------------------

/// Requests with no cookie, a garbage cookie, or an expired session all get
/// byte-identical 401 bodies; the ledger alone tells the causes apart.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rejections_are_uniform_outside_distinct_inside(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;
    sqlx::query("UPDATE sessions SET last_activity_at = NOW() - INTERVAL '31 minutes'")
        .execute(&pool)
        .await
        .unwrap();

    let no_cookie = common::get(common::build_test_app(pool.clone()), "/api/v1/sessions").await;

    let garbage = ClientSession {
        token: "not-a-real-token".to_string(),
        csrf: String::new(),
    };
    let bad_cookie =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &garbage).await;

    let expired =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;

    assert_eq!(no_cookie.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bad_cookie.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

    let body_a = body_json(no_cookie).await;
    let body_b = body_json(bad_cookie).await;
    let body_c = body_json(expired).await;
    assert_eq!(body_a, body_b, "rejection bodies must not differ");
    assert_eq!(body_b, body_c, "rejection bodies must not differ");
    assert_eq!(body_a["error"], "Authentication required");

    // Server-side, each cause landed as its own security event.
    assert_eq!(common::count_events(&pool, "session_missing", None).await, 2);
    assert_eq!(common::count_events(&pool, "session_expired_idle", None).await, 1);
}

/// The absolute ceiling ends a session no matter how recently it was used.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_absolute_lifetime_is_a_hard_stop(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;
    sqlx::query("UPDATE sessions SET expires_at = NOW() - INTERVAL '1 minute'")
        .execute(&pool)
        .await
        .unwrap();

    let response =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        common::count_events(&pool, "session_expired_absolute", Some(user.id)).await,
        1
    );

    let active: bool = sqlx::query_scalar("SELECT is_active FROM sessions WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!active, "the expired row must be deactivated");
}

/// A request inside the idle window succeeds and pushes the window forward.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_activity_extends_idle_window(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;
    sqlx::query("UPDATE sessions SET last_activity_at = NOW() - INTERVAL '20 minutes'")
        .execute(&pool)
        .await
        .unwrap();

    let response =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;
    assert_eq!(response.status(), StatusCode::OK);

    let touched: bool = sqlx::query_scalar(
        "SELECT last_activity_at > NOW() - INTERVAL '1 minute' FROM sessions WHERE is_active",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(touched, "the request should have refreshed last_activity_at");
}

// ---------------------------------------------------------------------------
// Fingerprint pinning
// ---------------------------------------------------------------------------

/// A valid token presented from a different client identity destroys the
/// session rather than merely rejecting the request.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fingerprint_mismatch_destroys_session(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/sessions")
        .header(USER_AGENT, "EntirelyDifferentBrowser/9.0")
        .header(ACCEPT_LANGUAGE, TEST_LANG)
        .header(COOKIE, session.cookie())
        .body(Body::empty())
        .unwrap();
    let response = common::send(common::build_test_app(pool.clone()), request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Authentication required");

    assert_eq!(
        common::count_events(&pool, "fingerprint_mismatch", Some(user.id)).await,
        1
    );
    assert_eq!(common::count_events(&pool, "hijack_destroyed", Some(user.id)).await, 1);

    // The legitimate client identity cannot use the token either; the
    // session is gone for good.
    let after =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// CSRF enforcement
// ---------------------------------------------------------------------------

/// Write verbs require the CSRF header; reads do not.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_csrf_required_on_writes_only(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;

    // Read without CSRF header passes.
    let read = get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;
    assert_eq!(read.status(), StatusCode::OK);

    // Write with the cookie but no CSRF header is the uniform 401.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/revoke-others")
        .header(USER_AGENT, TEST_UA)
        .header(ACCEPT_LANGUAGE, TEST_LANG)
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, session.cookie())
        .body(Body::from("{}"))
        .unwrap();
    let missing = common::send(common::build_test_app(pool.clone()), request).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"], "Authentication required");

    // Wrong CSRF value is rejected the same way.
    let forged = ClientSession {
        token: session.token.clone(),
        csrf: "forged-token".to_string(),
    };
    let wrong = post_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/revoke-others",
        serde_json::json!({}),
        &forged,
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(common::count_events(&pool, "csrf_rejected", Some(user.id)).await, 2);
}

/// A CSRF-rejected request must not count as activity.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_csrf_rejection_does_not_extend_idle_window(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;
    sqlx::query("UPDATE sessions SET last_activity_at = NOW() - INTERVAL '10 minutes'")
        .execute(&pool)
        .await
        .unwrap();

    let forged = ClientSession {
        token: session.token.clone(),
        csrf: "forged-token".to_string(),
    };
    let response = post_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/revoke-others",
        serde_json::json!({}),
        &forged,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let untouched: bool = sqlx::query_scalar(
        "SELECT last_activity_at < NOW() - INTERVAL '9 minutes' FROM sessions WHERE is_active",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(untouched, "a rejected request must not refresh last_activity_at");
}

// ---------------------------------------------------------------------------
// Device management
// ---------------------------------------------------------------------------

/// The device list shows every active session, marks the calling one, and
/// masks source addresses.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_sessions_masks_and_marks(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    let first = login(&pool, "drchen").await;
    let second = login(&pool, "drchen").await;

    // Give the first session a known address to observe the masking.
    let first_id = session_id_of(&pool, &first).await;
    sqlx::query("UPDATE sessions SET source_ip = '203.0.113.9' WHERE id = $1")
        .bind(first_id)
        .execute(&pool)
        .await
        .unwrap();

    let response =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &second).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let devices = json["data"].as_array().expect("data should be an array");
    assert_eq!(devices.len(), 2);

    for device in devices {
        assert!(device.get("token_hash").is_none(), "hashes must not be listed");
        let is_current = device["current"].as_bool().unwrap();
        if device["id"] == first_id {
            assert!(!is_current);
            assert_eq!(device["source_ip"], "203.0.x.x", "addresses must be masked");
        } else {
            assert!(is_current, "the calling session must be marked current");
        }
    }
}

/// A user can revoke one of their own sessions by id.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_destroy_own_session(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    let first = login(&pool, "drchen").await;
    let second = login(&pool, "drchen").await;
    let first_id = session_id_of(&pool, &first).await;

    let response = delete_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/sessions/{first_id}"),
        &second,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let rejected =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &first).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let still_fine =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &second).await;
    assert_eq!(still_fine.status(), StatusCode::OK);
}

/// Another user's session id answers 404 exactly like a nonexistent id, and
/// the foreign session survives.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_foreign_session_reads_as_missing(pool: PgPool) {
    create_user(&pool, "drchen", "clinician").await;
    create_user(&pool, "intruder", "clinician").await;
    let victim = login(&pool, "drchen").await;
    let attacker = login(&pool, "intruder").await;
    let victim_id = session_id_of(&pool, &victim).await;

    let foreign = delete_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/sessions/{victim_id}"),
        &attacker,
    )
    .await;
    let absent = delete_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/999999",
        &attacker,
    )
    .await;

    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    assert_eq!(absent.status(), StatusCode::NOT_FOUND);

    let victim_ok =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &victim).await;
    assert_eq!(victim_ok.status(), StatusCode::OK, "the foreign session must survive");
}

/// Revoke-others ends every session except the calling one.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revoke_others_spares_current(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let first = login(&pool, "drchen").await;
    let second = login(&pool, "drchen").await;
    let third = login(&pool, "drchen").await;

    let response = post_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/revoke-others",
        serde_json::json!({}),
        &third,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["revoked"], 2);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)::BIGINT FROM sessions WHERE user_id = $1 AND is_active",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);

    for stale in [&first, &second] {
        let rejected =
            get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", stale).await;
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    }
    let current =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &third).await;
    assert_eq!(current.status(), StatusCode::OK);
}

/// The idle preference is clamped into [300, 3600] rather than rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_idle_preference_is_clamped(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;

    let response = put_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/idle-timeout",
        serde_json::json!({ "idle_timeout_secs": 99999 }),
        &session,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["idle_timeout_secs"], 3600);

    let response = put_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/idle-timeout",
        serde_json::json!({ "idle_timeout_secs": 100 }),
        &session,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["idle_timeout_secs"], 300);

    let stored: i32 = sqlx::query_scalar("SELECT idle_timeout_secs FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 300);

    let response = get_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/idle-timeout",
        &session,
    )
    .await;
    assert_eq!(body_json(response).await["data"]["idle_timeout_secs"], 300);

    // The change itself is audit material, requested and applied both.
    let recorded: bool = sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM audit_events
            WHERE action = 'update' AND actor_user_id = $1
              AND details->>'requested_secs' = '100'
              AND details->>'applied_secs' = '300'
        )",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(recorded, "the preference change should be recorded with both values");
}

// ---------------------------------------------------------------------------
// Token rotation
// ---------------------------------------------------------------------------

/// Once the rotation interval elapses, the next request carries a fresh
/// cookie and CSRF token; the old pair stops working, the session survives.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rotation_swaps_credentials_in_place(pool: PgPool) {
    let user = create_user(&pool, "drchen", "clinician").await;
    let session = login(&pool, "drchen").await;
    let session_id = session_id_of(&pool, &session).await;

    sqlx::query("UPDATE sessions SET last_rotated_at = NOW() - INTERVAL '16 minutes'")
        .execute(&pool)
        .await
        .unwrap();

    let response =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("rotation should deliver a new cookie")
        .to_str()
        .unwrap()
        .to_string();
    let new_token = cookie
        .strip_prefix("medlock_session=")
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let new_csrf = response
        .headers()
        .get("x-csrf-token")
        .expect("rotation should deliver a new CSRF token")
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(new_token, session.token);

    // Same session row, new credentials.
    let rotated = ClientSession { token: new_token, csrf: new_csrf };
    assert_eq!(session_id_of(&pool, &rotated).await, session_id);

    let stale =
        get_authed(common::build_test_app(pool.clone()), "/api/v1/sessions", &session).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED, "the old token must be dead");

    let write = post_json_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/sessions/revoke-others",
        serde_json::json!({}),
        &rotated,
    )
    .await;
    assert_eq!(write.status(), StatusCode::OK, "the new CSRF token must verify");

    assert_eq!(common::count_events(&pool, "rotation", Some(user.id)).await, 1);
}
