//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to a JSON body
//! with a deterministic status code per [`RelayError`] variant.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatrelay_core::RelayError;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the chatrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the relay core.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ServerError {
    /// Status code and JSON body sent to the client.
    pub fn status_and_body(&self) -> (StatusCode, Value) {
        let ServerError::Relay(e) = self;
        match e {
            RelayError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request format" }),
            ),
            RelayError::UnknownAgent(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid Assistant ID" }),
            ),
            RelayError::ExternalService { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "External service error", "details": e.to_string() }),
            ),
            RelayError::RunFailed { .. } | RelayError::Timeout { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Assistant run failed", "details": e.to_string() }),
            ),
            RelayError::Streaming(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Streaming error", "details": e.to_string() }),
            ),
            RelayError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Request cancelled", "details": e.to_string() }),
            ),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        match &self {
            ServerError::Relay(e) if status.is_client_error() => {
                warn!(error = %e, outcome = e.kind(), status = status.as_u16(), "request rejected");
            }
            ServerError::Relay(e @ RelayError::Timeout { .. }) => {
                error!(error = %e, outcome = "timeout", "assistant run timed out");
            }
            ServerError::Relay(e @ RelayError::RunFailed { .. }) => {
                error!(error = %e, outcome = "run_failed", "assistant run failed");
            }
            ServerError::Relay(e) => {
                error!(error = %e, outcome = e.kind(), "chat request failed");
            }
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn client_errors_use_fixed_messages() {
        let (status, body) =
            ServerError::from(RelayError::InvalidRequest("missing message".into())).status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid request format" }));

        let (status, body) =
            ServerError::from(RelayError::UnknownAgent("bad-id".into())).status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid Assistant ID" }));
    }

    #[test]
    fn timeout_and_failure_share_client_shape() {
        let (s1, b1) = ServerError::from(RelayError::RunFailed {
            run_id: "run_1".into(),
            reason: "server_error".into(),
        })
        .status_and_body();
        let (s2, b2) = ServerError::from(RelayError::Timeout {
            run_id: "run_1".into(),
            elapsed: Duration::from_secs(120),
            polls: 120,
        })
        .status_and_body();

        assert_eq!(s1, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(s1, s2);
        assert_eq!(b1["error"], b2["error"]);
        assert!(b2["details"].as_str().unwrap().contains("did not finish"));
    }

    #[test]
    fn external_errors_carry_details() {
        let (status, body) = ServerError::from(RelayError::ExternalService {
            operation: "create_run",
            detail: "404 Not Found: No assistant found".into(),
        })
        .status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("No assistant found"));
    }

    #[test]
    fn cancelled_is_service_unavailable() {
        let (status, body) = ServerError::from(RelayError::Cancelled).status_and_body();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Request cancelled");
    }

    #[test]
    fn interrupted_stream_is_server_error() {
        let (status, body) =
            ServerError::from(RelayError::Streaming("connection reset".into())).status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("connection reset"));
    }
}
