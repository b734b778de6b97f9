//! Route definitions and error mapping for the firewall endpoints

use crate::core::error::Error;
use crate::core::gate::FirewallGate;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the firewall router. Routes live under `/firewall/*`; the root
/// path is intentionally never served.
pub fn firewall_router(gate: Arc<FirewallGate>) -> Router {
    Router::new()
        .route("/firewall/status", get(status_handler))
        .route("/firewall/maintenance", get(maintenance_handler))
        .route("/firewall/production", get(production_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(gate)
}

async fn status_handler(State(gate): State<Arc<FirewallGate>>) -> impl IntoResponse {
    (StatusCode::OK, gate.status().await.as_str())
}

async fn maintenance_handler(State(gate): State<Arc<FirewallGate>>) -> impl IntoResponse {
    match gate.request_maintenance().await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(err) => error_response(&err),
    }
}

async fn production_handler(State(gate): State<Arc<FirewallGate>>) -> impl IntoResponse {
    match gate.request_production().await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(err) => error_response(&err),
    }
}

/// Maps the transition error taxonomy onto HTTP status codes. Unrecoverable
/// errors still answer 500 here; the supervisor is already tearing the
/// process down via the fatal channel.
fn error_response(err: &Error) -> (StatusCode, String) {
    let status = match err {
        Error::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mode::FirewallMode;

    #[test]
    fn test_invalid_transition_maps_to_400() {
        let err = Error::InvalidTransition {
            from: FirewallMode::Maintenance,
            requested: FirewallMode::TransitionToMaintenance,
        };
        assert_eq!(error_response(&err).0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transition_failed_maps_to_500() {
        let err = Error::TransitionFailed {
            target: FirewallMode::Production,
            reason: "nft failed".to_string(),
        };
        assert_eq!(error_response(&err).0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unrecoverable_maps_to_500() {
        let err = Error::Unrecoverable("no known-good state".to_string());
        assert_eq!(error_response(&err).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
