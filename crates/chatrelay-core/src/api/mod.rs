//! Outbound contract with the hosted assistant service.
//!
//! Every operation is a single request/response; none is retried here.
//! Failures come back as [`RelayError::ExternalService`].

mod openai;

pub use openai::{DEFAULT_API_BASE, OpenAiAssistants};

use async_trait::async_trait;

use crate::error::RelayError;
use crate::run::{ConversationContext, Run, RunSnapshot};

/// Author of a message inside a conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message read back from a conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: Role,
    /// Ordered text parts; non-text content is not represented.
    pub parts: Vec<String>,
}

impl ThreadMessage {
    pub fn assistant(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            role: Role::Assistant,
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }
}

/// The hosted job system a run is submitted to.
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Open a fresh conversation context.
    async fn create_context(&self) -> Result<ConversationContext, RelayError>;

    /// Attach a message to `context`.
    async fn add_message(
        &self,
        context: &ConversationContext,
        role: Role,
        content: &str,
    ) -> Result<(), RelayError>;

    /// Submit a run of `agent_id` against `context`.
    async fn create_run(
        &self,
        context: &ConversationContext,
        agent_id: &str,
    ) -> Result<Run, RelayError>;

    /// Current status of a run.
    async fn get_run_status(&self, context_id: &str, run_id: &str)
        -> Result<RunSnapshot, RelayError>;

    /// Messages of a context, most recent first.
    async fn list_messages(&self, context_id: &str) -> Result<Vec<ThreadMessage>, RelayError>;
}
