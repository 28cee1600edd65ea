//! Bounded, cancellable wait for a run to reach a terminal state.
//!
//! Each wait runs on its own tokio task and holds nothing shared while it
//! sleeps between polls. Three things end it besides a terminal status:
//! the deadline, the optional poll cap, and the request's
//! [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::AssistantsApi;
use crate::config::PollSettings;
use crate::error::RelayError;
use crate::run::{CompletedRun, Run, Transition};

/// Stand-in deadline for a timeout too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Clone)]
pub struct RunPoller {
    api: Arc<dyn AssistantsApi>,
    settings: PollSettings,
}

impl RunPoller {
    pub fn new(api: Arc<dyn AssistantsApi>, settings: PollSettings) -> Self {
        Self { api, settings }
    }

    /// Poll on a dedicated task until `run` is terminal.
    ///
    /// Dropping the returned future cancels `cancel`, which stops the
    /// spawned poll loop at its next suspension point.
    pub async fn spawn_await(
        &self,
        run: Run,
        cancel: CancellationToken,
    ) -> Result<CompletedRun, RelayError> {
        let poller = self.clone();
        let guard = cancel.clone().drop_guard();
        let handle = tokio::spawn(async move { poller.await_terminal(run, &cancel).await });

        let joined = handle.await;
        guard.disarm();
        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RelayError::Cancelled),
        }
    }

    /// Poll at the configured interval until `run` is terminal.
    ///
    /// `completed` yields a [`CompletedRun`]; a reported `failed` yields
    /// [`RelayError::RunFailed`]; running out of time or polls yields
    /// [`RelayError::Timeout`]. No poll is issued after a terminal status.
    pub async fn await_terminal(
        &self,
        mut run: Run,
        cancel: &CancellationToken,
    ) -> Result<CompletedRun, RelayError> {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.settings.timeout)
            .unwrap_or(started + FAR_FUTURE);
        let mut polls: u32 = 0;

        while !run.status().is_terminal() {
            if self.settings.max_polls.is_some_and(|max| polls >= max) {
                return Err(self.timed_out(&run, started, polls));
            }

            let wake = Instant::now()
                .checked_add(self.settings.interval)
                .map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&run, polls)),
                _ = sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(&run, started, polls));
            }

            let fetch = timeout_at(deadline, self.api.get_run_status(&run.context_id, &run.id));
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&run, polls)),
                fetched = fetch => match fetched {
                    Ok(result) => result?,
                    Err(_) => return Err(self.timed_out(&run, started, polls)),
                },
            };
            polls += 1;

            if let Transition::Rejected { reported } = run.observe(snapshot) {
                debug!(run_id = %run.id, %reported, poll = polls, "stale status ignored");
            }
        }

        let elapsed = started.elapsed();
        match run.into_completed() {
            Ok(done) => {
                info!(run_id = %done.run().id, polls, elapsed_ms = elapsed.as_millis(), "run completed");
                Ok(done)
            }
            Err(run) => {
                let reason = run.failure().unwrap_or("failed").to_owned();
                warn!(
                    run_id = %run.id,
                    polls,
                    %reason,
                    outcome = "run_failed",
                    "run reported failed"
                );
                Err(RelayError::RunFailed {
                    run_id: run.id,
                    reason,
                })
            }
        }
    }

    fn timed_out(&self, run: &Run, started: Instant, polls: u32) -> RelayError {
        let elapsed = started.elapsed();
        warn!(
            run_id = %run.id,
            polls,
            elapsed_ms = elapsed.as_millis(),
            last_status = %run.status(),
            outcome = "timeout",
            "run wait timed out"
        );
        RelayError::Timeout {
            run_id: run.id.clone(),
            elapsed,
            polls,
        }
    }

    fn cancelled(&self, run: &Run, polls: u32) -> RelayError {
        info!(run_id = %run.id, polls, "run wait cancelled");
        RelayError::Cancelled
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
