//! Scripted in-memory [`AssistantsApi`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{AssistantsApi, Role, ThreadMessage};
use crate::error::RelayError;
use crate::run::{ConversationContext, Run, RunSnapshot, RunStatus};

/// Fake collaborator driven by a script of status reports.
///
/// The last scripted status repeats forever once the script runs out.
#[derive(Debug)]
pub struct ScriptedAssistants {
    statuses: Mutex<VecDeque<RunSnapshot>>,
    reply: Vec<String>,
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAssistants {
    /// A run that reports `completed` on its first poll and answers `reply`.
    pub fn completing(reply: &str) -> Self {
        Self::with_statuses([RunSnapshot::new(RunStatus::Completed)]).reply_parts([reply])
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = RunSnapshot>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            reply: Vec::new(),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_parts(mut self, parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.reply = parts.into_iter().map(Into::into).collect();
        self
    }

    /// Make the named operation fail with an external-service error.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<(), RelayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation.to_owned());
        }
        match self.fail_on {
            Some(op) if op == operation => {
                Err(RelayError::external(operation, "scripted failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AssistantsApi for ScriptedAssistants {
    async fn create_context(&self) -> Result<ConversationContext, RelayError> {
        self.enter("create_context")?;
        Ok(ConversationContext::new("thread_test"))
    }

    async fn add_message(
        &self,
        _context: &ConversationContext,
        _role: Role,
        _content: &str,
    ) -> Result<(), RelayError> {
        self.enter("add_message")
    }

    async fn create_run(
        &self,
        context: &ConversationContext,
        agent_id: &str,
    ) -> Result<Run, RelayError> {
        self.enter("create_run")?;
        Ok(Run::new("run_test", &context.id, agent_id, RunStatus::Queued))
    }

    async fn get_run_status(
        &self,
        _context_id: &str,
        _run_id: &str,
    ) -> Result<RunSnapshot, RelayError> {
        self.enter("get_run_status")?;
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|e| RelayError::external("get_run_status", e))?;
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        next.ok_or_else(|| RelayError::external("get_run_status", "empty status script"))
    }

    async fn list_messages(&self, _context_id: &str) -> Result<Vec<ThreadMessage>, RelayError> {
        self.enter("list_messages")?;
        Ok(vec![
            ThreadMessage::assistant(self.reply.clone()),
            ThreadMessage {
                role: Role::User,
                parts: vec!["hello".to_owned()],
            },
        ])
    }
}
