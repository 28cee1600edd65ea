//! Error taxonomy shared by every stage of a relayed exchange.
//!
//! Each variant maps to exactly one client-visible outcome at the HTTP
//! boundary; see `chatrelay-server`'s `ServerError` for that mapping.

use std::time::Duration;

use thiserror::Error;

/// All errors that can occur while relaying one chat message.
#[derive(Debug, Error, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RelayError {
    /// The request body was absent, undecodable, or carried no message.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The supplied assistant id is not in the configured allow-list.
    #[error("unknown assistant id: {0}")]
    UnknownAgent(String),

    /// The collaborator rejected a call or answered with something we
    /// could not interpret.
    #[error("{operation} failed: {detail}")]
    ExternalService {
        operation: &'static str,
        detail: String,
    },

    /// The collaborator reported the run as failed.
    #[error("run {run_id} failed: {reason}")]
    RunFailed { run_id: String, reason: String },

    /// The run did not reach a terminal state within the configured bound.
    #[error("run {run_id} did not finish within {elapsed:?} ({polls} status polls)")]
    Timeout {
        run_id: String,
        elapsed: Duration,
        polls: u32,
    },

    /// Output delivery broke after the response head was committed.
    #[error("stream interrupted: {0}")]
    Streaming(String),

    /// The request was abandoned by the client or the server is shutting down.
    #[error("request cancelled")]
    Cancelled,
}

impl RelayError {
    pub(crate) fn external(operation: &'static str, detail: impl ToString) -> Self {
        RelayError::ExternalService {
            operation,
            detail: detail.to_string(),
        }
    }

    /// Stable snake_case label, used as the `outcome` field in logs.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}
