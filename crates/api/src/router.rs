//! Application router assembly.
//!
//! [`build_app_router`] is the single place the middleware stack is put
//! together; the binary and the integration tests both call it, so a test
//! request crosses exactly the layers a production request would.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::middleware::session::CSRF_HEADER;
use crate::routes;
use crate::state::AppState;

/// Assemble the full [`Router`]: probe route, versioned API, outer layers.
///
/// Layers are listed innermost-first: catch-panic sits closest to the
/// handlers, request-id stamping and CORS outermost. The session guard and
/// the audit access recorder are `route_layer`s inside
/// [`routes::api_routes`] rather than part of this outer stack; they must
/// not run for the probe route.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS for the browser client.
///
/// The session rides a cookie, so credentials are allowed and the origin
/// list is explicit, never `Any`. The CSRF header is accepted on requests
/// and exposed on responses; rotation hands the client its next token
/// through that response header. An unparseable configured origin panics
/// here, at startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("CORS origin '{origin}' does not parse: {e}"))
        })
        .collect();

    let csrf_header = HeaderName::from_static(CSRF_HEADER);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, csrf_header.clone()])
        .expose_headers([csrf_header])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
