//! Access auditing for the compliance read surface.
//!
//! The middleware wraps every matched `/audit` route. After the handler
//! completes it derives the action from the HTTP verb, the subject from the
//! path shape, and the outcome and duration from the response, then forwards
//! one event to the recorder without touching the response itself.
//!
//! Routes whose subject is regulated personal data (a patient trail, the
//! per-patient access report) are write-before-respond: when the audit
//! write fails, the otherwise-successful response is withheld and the
//! client gets the audit failure instead. Everything else records
//! best-effort.
//!
//! Authentication and session-management routes are not wrapped here; the
//! session store and the login flow write their own activity and
//! security events.

use std::time::Instant;

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use medlock_core::audit::{action_for_method, is_phi_subject, subjects};
use medlock_core::types::DbId;
use medlock_db::models::audit::CreateAuditEvent;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::session::{client_ip, user_agent, SessionContext};
use crate::state::AppState;

/// What a request path says about the data it reads.
#[derive(Debug)]
pub struct AccessClass {
    pub subject_type: String,
    pub subject_id: Option<DbId>,
    /// True when the subject is regulated personal data.
    pub phi: bool,
}

/// Derive the audited subject from the request path.
///
/// Accepts the path with or without the `/api/v1` mount prefix, since the
/// middleware may see either depending on where it is layered.
pub fn classify_access(path: &str) -> AccessClass {
    let trimmed = path.strip_prefix("/api/v1").unwrap_or(path);
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["audit", "phi-access", patient_id] => AccessClass {
            subject_type: subjects::PATIENT.to_string(),
            subject_id: patient_id.parse().ok(),
            phi: true,
        },
        ["audit", "subjects", subject_type, subject_id] => AccessClass {
            subject_type: (*subject_type).to_string(),
            subject_id: subject_id.parse().ok(),
            phi: is_phi_subject(subject_type),
        },
        ["audit", "actors", user_id] => AccessClass {
            subject_type: subjects::USER.to_string(),
            subject_id: user_id.parse().ok(),
            phi: false,
        },
        ["audit", "events", event_id, _] => AccessClass {
            subject_type: subjects::SYSTEM.to_string(),
            subject_id: event_id.parse().ok(),
            phi: false,
        },
        _ => AccessClass {
            subject_type: subjects::SYSTEM.to_string(),
            subject_id: None,
            phi: false,
        },
    }
}

/// Middleware: audit one request against the compliance surface.
pub async fn record_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().as_str().to_string();
    // This layer sits inside the `/api/v1` and `/audit` nests, which strip
    // their prefixes from `request.uri()`; the original client-facing path
    // is carried in the `OriginalUri` extension.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let actor = request
        .extensions()
        .get::<SessionContext>()
        .map(|ctx| ctx.user_id);
    let source_ip = client_ip(request.headers());
    let agent = user_agent(request.headers());

    let response = next.run(request).await;

    let status = response.status();
    let outcome = if status.is_success() {
        "success"
    } else if status.is_client_error() {
        "rejected"
    } else {
        "fault"
    };
    let class = classify_access(&path);
    let entry = CreateAuditEvent {
        actor_user_id: actor,
        subject_type: class.subject_type,
        subject_id: class.subject_id,
        action: action_for_method(&method).to_string(),
        description: format!("{method} {path}"),
        details: Some(json!({
            "method": method,
            "path": path,
            "status": status.as_u16(),
            "outcome": outcome,
            "duration_ms": started.elapsed().as_millis() as u64,
        })),
        source_ip,
        user_agent: agent,
    };

    // Write-before-respond applies only to successful PHI reads; a failed
    // handler already has nothing to withhold.
    let write_gates_response =
        class.phi && status.is_success() && state.config.security.phi_audit_required;
    if write_gates_response {
        if let Err(e) = state.recorder.record_required(entry).await {
            return AppError::Security(e).into_response();
        }
    } else {
        state.recorder.record(entry).await;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_access_path_is_a_patient_subject() {
        let class = classify_access("/api/v1/audit/phi-access/42");
        assert_eq!(class.subject_type, "patient");
        assert_eq!(class.subject_id, Some(42));
        assert!(class.phi);
    }

    #[test]
    fn patient_trail_is_phi_but_user_trail_is_not() {
        let patient = classify_access("/audit/subjects/patient/7");
        assert!(patient.phi);
        assert_eq!(patient.subject_id, Some(7));

        let user = classify_access("/audit/subjects/user/7");
        assert!(!user.phi);
        assert_eq!(user.subject_type, "user");
    }

    #[test]
    fn actor_trail_targets_the_user() {
        let class = classify_access("/api/v1/audit/actors/3");
        assert_eq!(class.subject_type, "user");
        assert_eq!(class.subject_id, Some(3));
        assert!(!class.phi);
    }

    #[test]
    fn flag_route_captures_the_event_id() {
        let class = classify_access("/audit/events/19/flag");
        assert_eq!(class.subject_type, "system");
        assert_eq!(class.subject_id, Some(19));
        assert!(!class.phi);
    }

    #[test]
    fn listing_routes_fall_back_to_system() {
        for path in ["/audit/events", "/audit/flagged", "/audit/security-events"] {
            let class = classify_access(path);
            assert_eq!(class.subject_type, "system");
            assert_eq!(class.subject_id, None);
            assert!(!class.phi);
        }
    }
}
