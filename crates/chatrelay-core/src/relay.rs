//! End-to-end orchestration of one exchange:
//! validate → submit → await terminal → fetch or stream.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::AssistantsApi;
use crate::chunk::OutputChunk;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::gateway::{self, ChatRequest};
use crate::poller::RunPoller;
use crate::streamer::ResultStreamer;
use crate::submitter::JobSubmitter;

/// What a successful exchange hands back to the transport.
pub enum ChatReply {
    /// The whole reply as one string.
    Complete(String),
    /// A finite, non-restartable chunk sequence.
    Stream(BoxStream<'static, OutputChunk>),
}

impl std::fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatReply::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            ChatReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The relay core. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct ChatRelay {
    config: Arc<RelayConfig>,
    submitter: JobSubmitter,
    poller: RunPoller,
    streamer: ResultStreamer,
}

impl ChatRelay {
    pub fn new(config: Arc<RelayConfig>, api: Arc<dyn AssistantsApi>) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&api)),
            poller: RunPoller::new(Arc::clone(&api), config.poll.clone()),
            streamer: ResultStreamer::new(api, config.stream.clone()),
            config,
        }
    }

    /// Relay one chat request.
    ///
    /// Validation happens before any collaborator call. The terminal-state
    /// wait finishes before this returns, so run failures and timeouts are
    /// reported as errors rather than in-band. `cancel` is tied to the
    /// request: dropping the returned stream (or this future) cancels it.
    pub async fn handle(
        &self,
        request: Option<ChatRequest>,
        cancel: CancellationToken,
    ) -> Result<ChatReply, RelayError> {
        let chat = gateway::validate(request, &self.config).inspect_err(|e| {
            warn!(error = %e, outcome = e.kind(), "chat request rejected");
        })?;
        info!(
            message_len = chat.message.len(),
            agent_id = %chat.agent_id,
            stream = chat.stream,
            "chat request accepted"
        );
        debug!(message = %chat.message, "user message");

        let run = self.submitter.submit(&chat.agent_id, &chat.message).await?;
        let run_id = run.id.clone();
        let completed = self.poller.spawn_await(run, cancel.clone()).await?;

        if chat.stream {
            info!(%run_id, outcome = "ok", "streaming reply");
            return Ok(ChatReply::Stream(self.streamer.stream(completed, cancel)));
        }

        let reply = self.streamer.fetch(completed).await?;
        info!(%run_id, reply_len = reply.len(), outcome = "ok", "reply ready");
        debug!(reply = %reply, "assistant reply");
        Ok(ChatReply::Complete(reply))
    }
}
