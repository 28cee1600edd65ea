//! Run-state model shared by the submitter, poller and streamer.
//!
//! A [`Run`] only ever moves forward through
//! `queued → in_progress → {completed | failed}`. Output may only be read
//! from a [`CompletedRun`], which nothing outside this crate can construct
//! except by awaiting a terminal state.

use tracing::{debug, warn};

/// Lifecycle state of a submitted run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    /// `completed` and `failed` are terminal; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            RunStatus::Queued => 0,
            RunStatus::InProgress => 1,
            RunStatus::Completed | RunStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward (or idle) step.
    pub fn can_advance_to(self, next: RunStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// One status observation reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Collaborator-supplied reason, only meaningful for `failed`.
    pub failure: Option<String>,
}

impl RunSnapshot {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            failure: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            failure: Some(reason.into()),
        }
    }
}

/// Server-side container scoping exactly one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub id: String,
}

impl ConversationContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Outcome of feeding a [`RunSnapshot`] into [`Run::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: RunStatus, to: RunStatus },
    Unchanged,
    /// The report would have moved the run backwards and was dropped.
    Rejected { reported: RunStatus },
}

/// One submitted unit of work against a context and an assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub context_id: String,
    pub agent_id: String,
    status: RunStatus,
    failure: Option<String>,
}

impl Run {
    pub fn new(
        id: impl Into<String>,
        context_id: impl Into<String>,
        agent_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            agent_id: agent_id.into(),
            status,
            failure: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Apply a status report, keeping the status monotonic.
    pub fn observe(&mut self, snapshot: RunSnapshot) -> Transition {
        let from = self.status;
        if snapshot.status == from {
            return Transition::Unchanged;
        }
        if !from.can_advance_to(snapshot.status) {
            warn!(
                run_id = %self.id,
                current = %from,
                reported = %snapshot.status,
                "ignoring backwards run status report"
            );
            return Transition::Rejected {
                reported: snapshot.status,
            };
        }
        debug!(run_id = %self.id, from = %from, to = %snapshot.status, "run status advanced");
        self.status = snapshot.status;
        if snapshot.status == RunStatus::Failed {
            self.failure = snapshot.failure;
        }
        Transition::Advanced {
            from,
            to: snapshot.status,
        }
    }

    /// Promote to a [`CompletedRun`] if the run has completed.
    pub(crate) fn into_completed(self) -> Result<CompletedRun, Run> {
        if self.status == RunStatus::Completed {
            Ok(CompletedRun(self))
        } else {
            Err(self)
        }
    }
}

/// A run observed in the `completed` state; the only handle output can be
/// fetched through. Consumed by the fetch, so output is read at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun(Run);

impl CompletedRun {
    pub fn run(&self) -> &Run {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn queued() -> Run {
        Run::new("run_1", "thread_1", "asst_1", RunStatus::Queued)
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("in_progress".parse::<RunStatus>().ok(), Some(RunStatus::InProgress));
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert!("requires_action".parse::<RunStatus>().is_err());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn run_advances_forward() {
        let mut run = queued();
        assert_eq!(
            run.observe(RunSnapshot::new(RunStatus::InProgress)),
            Transition::Advanced {
                from: RunStatus::Queued,
                to: RunStatus::InProgress
            }
        );
        assert_eq!(run.observe(RunSnapshot::new(RunStatus::InProgress)), Transition::Unchanged);
        assert_eq!(
            run.observe(RunSnapshot::new(RunStatus::Completed)),
            Transition::Advanced {
                from: RunStatus::InProgress,
                to: RunStatus::Completed
            }
        );
        assert_eq!(run.status(), RunStatus::Completed);
    }

    #[test]
    fn backwards_report_is_rejected() {
        let mut run = queued();
        run.observe(RunSnapshot::new(RunStatus::InProgress));
        assert_eq!(
            run.observe(RunSnapshot::new(RunStatus::Queued)),
            Transition::Rejected {
                reported: RunStatus::Queued
            }
        );
        assert_eq!(run.status(), RunStatus::InProgress);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut run = queued();
        run.observe(RunSnapshot::failed("rate_limit_exceeded"));
        assert_eq!(run.failure(), Some("rate_limit_exceeded"));
        assert!(matches!(
            run.observe(RunSnapshot::new(RunStatus::Completed)),
            Transition::Rejected { .. }
        ));
        assert_eq!(run.status(), RunStatus::Failed);
    }

    #[test]
    fn only_completed_runs_promote() {
        assert!(queued().into_completed().is_err());
        let mut run = queued();
        run.observe(RunSnapshot::new(RunStatus::Completed));
        let done = run.into_completed().expect("completed run");
        assert_eq!(done.run().id, "run_1");
    }
}
