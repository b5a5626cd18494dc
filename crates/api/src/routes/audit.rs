//! Route definitions for the `/audit` compliance surface.

use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::audit::access::record_access;
use crate::handlers::audit;
use crate::state::AppState;

/// Routes mounted at `/audit`. RBAC is enforced by handler extractors
/// (auditor or admin for reads, admin for the retention sweep).
///
/// Every request to this subtree is itself recorded by [`record_access`];
/// for PHI views the record is written before the response leaves.
///
/// ```text
/// GET  /events                          -> list_events
/// GET  /subjects/{subject_type}/{id}    -> subject_trail
/// GET  /actors/{id}                     -> actor_trail
/// GET  /flagged                         -> flagged_events
/// GET  /security-events                 -> security_events
/// GET  /phi-access/{patient_id}         -> phi_access
/// POST /events/{id}/flag                -> flag_event
/// POST /events/{id}/unflag              -> unflag_event
/// POST /retention/run                   -> run_retention (admin)
/// ```
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/events", get(audit::list_events))
        .route(
            "/subjects/{subject_type}/{subject_id}",
            get(audit::subject_trail),
        )
        .route("/actors/{id}", get(audit::actor_trail))
        .route("/flagged", get(audit::flagged_events))
        .route("/security-events", get(audit::security_events))
        .route("/phi-access/{patient_id}", get(audit::phi_access))
        .route("/events/{id}/flag", post(audit::flag_event))
        .route("/events/{id}/unflag", post(audit::unflag_event))
        .route("/retention/run", post(audit::run_retention))
        .route_layer(middleware::from_fn_with_state(state, record_access))
}
