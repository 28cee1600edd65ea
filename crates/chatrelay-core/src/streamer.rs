//! Output retrieval and paced chunk delivery for completed runs.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::api::{AssistantsApi, Role, ThreadMessage};
use crate::chunk::{OutputChunk, rechunk};
use crate::config::StreamSettings;
use crate::error::RelayError;
use crate::run::CompletedRun;

#[derive(Clone)]
pub struct ResultStreamer {
    api: Arc<dyn AssistantsApi>,
    settings: StreamSettings,
}

impl ResultStreamer {
    pub fn new(api: Arc<dyn AssistantsApi>, settings: StreamSettings) -> Self {
        Self { api, settings }
    }

    /// Read the reply of a completed run as one string.
    pub async fn fetch(&self, run: CompletedRun) -> Result<String, RelayError> {
        Ok(fetch_parts(self.api.as_ref(), &run).await?.concat())
    }

    /// Turn a completed run into a finite, paced sequence of chunks.
    ///
    /// The reply is read when the stream is first polled. A failure at any
    /// point ends the stream with one [`OutputChunk::Error`]. Dropping the
    /// stream cancels `cancel`.
    pub fn stream(
        &self,
        run: CompletedRun,
        cancel: CancellationToken,
    ) -> BoxStream<'static, OutputChunk> {
        let api = Arc::clone(&self.api);
        let policy = self.settings.policy;

        let source = stream::once(async move { fetch_parts(api.as_ref(), &run).await })
            .flat_map(move |fetched| match fetched {
                Ok(parts) => stream::iter(rechunk(parts, policy).into_iter().map(Ok)).left_stream(),
                Err(e) => stream::iter([Err(e)]).right_stream(),
            })
            .boxed();

        pace(source, self.settings.chunk_delay, cancel)
    }
}

/// Text parts of the newest assistant message in the run's context.
async fn fetch_parts(
    api: &dyn AssistantsApi,
    run: &CompletedRun,
) -> Result<Vec<String>, RelayError> {
    let context_id = &run.run().context_id;
    let mut messages = api.list_messages(context_id).await?;
    if messages.is_empty() {
        return Err(RelayError::external("list_messages", "no assistant reply"));
    }
    let position = messages
        .iter()
        .position(|m| m.role == Role::Assistant)
        .unwrap_or(0);
    let ThreadMessage { parts, .. } = messages.swap_remove(position);
    debug!(run_id = %run.run().id, parts = parts.len(), "reply fetched");
    Ok(parts)
}

struct Pacer {
    source: BoxStream<'static, Result<String, RelayError>>,
    delay: Duration,
    cancel: CancellationToken,
    _guard: DropGuard,
    emitted: usize,
    finished: bool,
}

/// Forward `source` as chunks, waiting `delay` between two emissions.
///
/// Pass-through delivery: each item becomes one chunk as soon as it
/// arrives. The first error (or cancellation) is emitted as a final
/// [`OutputChunk::Error`] and nothing follows it.
pub fn pace(
    source: BoxStream<'static, Result<String, RelayError>>,
    delay: Duration,
    cancel: CancellationToken,
) -> BoxStream<'static, OutputChunk> {
    let pacer = Pacer {
        source,
        delay,
        _guard: cancel.clone().drop_guard(),
        cancel,
        emitted: 0,
        finished: false,
    };

    stream::unfold(pacer, |mut p| async move {
        if p.finished {
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = p.cancel.cancelled() => Some(Err(RelayError::Cancelled)),
            item = p.source.next() => item,
        };

        let text = match next {
            None => return None,
            Some(Ok(text)) => text,
            Some(Err(e)) => return Some((p.fail(e), p)),
        };

        if p.emitted > 0 && !p.delay.is_zero() {
            tokio::select! {
                biased;
                _ = p.cancel.cancelled() => return Some((p.fail(RelayError::Cancelled), p)),
                _ = tokio::time::sleep(p.delay) => {}
            }
        }
        p.emitted += 1;
        Some((OutputChunk::Text(text), p))
    })
    .boxed()
}

impl Pacer {
    fn fail(&mut self, error: RelayError) -> OutputChunk {
        self.finished = true;
        let error = match error {
            RelayError::Streaming(_) => error,
            other => RelayError::Streaming(other.to_string()),
        };
        warn!(emitted = self.emitted, error = %error, outcome = "streaming_error", "stream ended early");
        OutputChunk::Error(error.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
