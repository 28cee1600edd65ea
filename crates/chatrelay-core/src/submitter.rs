//! Job submission: one fresh context, one user turn, one run.

use std::sync::Arc;

use tracing::info;

use crate::api::{AssistantsApi, Role};
use crate::error::RelayError;
use crate::run::Run;

#[derive(Clone)]
pub struct JobSubmitter {
    api: Arc<dyn AssistantsApi>,
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn AssistantsApi>) -> Self {
        Self { api }
    }

    /// Create a context holding `message` as its only turn and start a run
    /// of `agent_id` on it. Exactly one run is created; nothing is retried.
    pub async fn submit(&self, agent_id: &str, message: &str) -> Result<Run, RelayError> {
        let context = self.api.create_context().await?;
        self.api.add_message(&context, Role::User, message).await?;
        let run = self.api.create_run(&context, agent_id).await?;
        info!(
            context_id = %context.id,
            run_id = %run.id,
            agent_id,
            status = %run.status(),
            "run submitted"
        );
        Ok(run)
    }
}
