//! Immutable relay configuration, built once at startup and shared by
//! every request through an `Arc`.

use std::collections::BTreeSet;
use std::time::Duration;

/// How a completed reply is cut into output chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChunkPolicy {
    /// Split the final text on whitespace boundaries.
    #[default]
    Words,
    /// Forward each content part the collaborator delivered as one chunk.
    Parts,
}

/// Terminal-state wait settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between two status polls.
    pub interval: Duration,
    /// Upper bound on the whole wait, measured from the moment it starts
    /// (one interval before the first poll).
    pub timeout: Duration,
    /// Optional cap on the number of status polls.
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            max_polls: None,
        }
    }
}

/// Output delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Pause between two emitted chunks. Zero disables pacing.
    pub chunk_delay: Duration,
    pub policy: ChunkPolicy,
    /// Whether a request that does not say otherwise is streamed.
    pub stream_by_default: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_millis(50),
            policy: ChunkPolicy::Words,
            stream_by_default: false,
        }
    }
}

/// Process-wide, read-only configuration of the relay core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    default_agent: String,
    allowed_agents: BTreeSet<String>,
    pub poll: PollSettings,
    pub stream: StreamSettings,
}

impl RelayConfig {
    /// The default assistant is always part of the allow-list.
    pub fn new(default_agent: impl Into<String>) -> Self {
        let default_agent = default_agent.into();
        let allowed_agents = BTreeSet::from([default_agent.clone()]);
        Self {
            default_agent,
            allowed_agents,
            poll: PollSettings::default(),
            stream: StreamSettings::default(),
        }
    }

    pub fn with_allowed_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_agents.extend(
            agents
                .into_iter()
                .map(Into::into)
                .filter(|a: &String| !a.is_empty()),
        );
        self
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_stream(mut self, stream: StreamSettings) -> Self {
        self.stream = stream;
        self
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    pub fn is_allowed(&self, agent_id: &str) -> bool {
        self.allowed_agents.contains(agent_id)
    }
}
