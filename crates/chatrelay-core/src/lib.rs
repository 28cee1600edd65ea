//! chatrelay-core – run-lifecycle bridge between a chat endpoint and a
//! hosted assistant job system.
//!
//! A message becomes a run on a named assistant ([`JobSubmitter`]), the
//! run is polled until terminal on its own task ([`RunPoller`]), and the
//! reply is handed back whole or as a paced chunk stream
//! ([`ResultStreamer`]). [`ChatRelay`] strings the three together.

pub mod api;
pub mod chunk;
pub mod config;
pub mod error;
pub mod gateway;
pub mod poller;
pub mod relay;
pub mod run;
pub mod streamer;
pub mod submitter;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use api::{AssistantsApi, OpenAiAssistants, Role, ThreadMessage};
pub use chunk::OutputChunk;
pub use config::{ChunkPolicy, PollSettings, RelayConfig, StreamSettings};
pub use error::RelayError;
pub use gateway::{ChatRequest, ValidatedChat};
pub use poller::RunPoller;
pub use relay::{ChatRelay, ChatReply};
pub use run::{CompletedRun, ConversationContext, Run, RunSnapshot, RunStatus};
pub use streamer::ResultStreamer;
pub use submitter::JobSubmitter;
