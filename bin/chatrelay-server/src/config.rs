//! Server configuration, loaded from environment variables at startup.

use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{Context, bail};
use chatrelay_core::api::DEFAULT_API_BASE;
use chatrelay_core::{ChunkPolicy, PollSettings, RelayConfig, StreamSettings};

const POLL_INTERVAL_MS: RangeInclusive<u64> = 1..=600_000;
const RUN_TIMEOUT_SECS: RangeInclusive<u64> = 1..=86_400;
const HTTP_TIMEOUT_SECS: RangeInclusive<u64> = 1..=3_600;
const CHUNK_DELAY_MS: RangeInclusive<u64> = 0..=60_000;

/// Runtime configuration for chatrelay-server.
///
/// Only the API key and the default assistant are mandatory; everything
/// else falls back to a default.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`). `PORT` overrides
    /// the port part.
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origin list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Credential for the assistant service.
    pub api_key: String,

    /// Base URL of the assistant service.
    pub api_base: String,

    /// Bound on every single outbound HTTP call.
    pub http_timeout: Duration,

    /// Assistant used when a request names none.
    pub default_agent: String,

    /// Additional assistants a request may name.
    pub allowed_agents: Vec<String>,

    pub poll: PollSettings,

    pub stream: StreamSettings,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("http_timeout", &self.http_timeout)
            .field("default_agent", &self.default_agent)
            .field("allowed_agents", &self.allowed_agents)
            .field("poll", &self.poll)
            .field("stream", &self.stream)
            .finish()
    }
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_key = env.required("OPENAI_API_KEY")?;
        let default_agent = env.required("RELAY_DEFAULT_AGENT")?;

        let mut bind_address = env.or("RELAY_BIND", "0.0.0.0:5000");
        if let Some(port) = env.get("PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("PORT='{port}' is not a valid port"))?;
            let host = bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_owned())
                .unwrap_or_else(|| "0.0.0.0".to_owned());
            bind_address = format!("{host}:{port}");
        }

        let chunking = env.or("RELAY_CHUNKING", "words");
        let policy: ChunkPolicy = chunking
            .parse()
            .with_context(|| format!("RELAY_CHUNKING='{chunking}' must be 'words' or 'parts'"))?;

        let max_polls = env.parse("RELAY_MAX_POLLS", 0u32);
        let poll_interval_ms = env.ranged("RELAY_POLL_INTERVAL_MS", 1000, POLL_INTERVAL_MS)?;
        let run_timeout_secs = env.ranged("RELAY_RUN_TIMEOUT_SECS", 120, RUN_TIMEOUT_SECS)?;
        let http_timeout_secs = env.ranged("RELAY_HTTP_TIMEOUT_SECS", 30, HTTP_TIMEOUT_SECS)?;
        let chunk_delay_ms = env.ranged("RELAY_CHUNK_DELAY_MS", 50, CHUNK_DELAY_MS)?;

        Ok(Self {
            bind_address,
            log_level: env.or("RELAY_LOG", "info"),
            log_json: env.flag("RELAY_LOG_JSON"),
            cors_allowed_origins: env.get("RELAY_CORS_ORIGINS"),
            api_key,
            api_base: env.or("RELAY_API_BASE", DEFAULT_API_BASE),
            http_timeout: Duration::from_secs(http_timeout_secs),
            default_agent,
            allowed_agents: env
                .get("RELAY_ALLOWED_AGENTS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            poll: PollSettings {
                interval: Duration::from_millis(poll_interval_ms),
                timeout: Duration::from_secs(run_timeout_secs),
                max_polls: (max_polls > 0).then_some(max_polls),
            },
            stream: StreamSettings {
                chunk_delay: Duration::from_millis(chunk_delay_ms),
                policy,
                stream_by_default: env.flag("RELAY_STREAM_DEFAULT"),
            },
        })
    }

    /// The immutable slice of configuration handed to the relay core.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new(&self.default_agent)
            .with_allowed_agents(self.allowed_agents.iter().cloned())
            .with_poll(self.poll.clone())
            .with_stream(self.stream.clone())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        match self.get(key) {
            Some(v) => Ok(v),
            None => bail!("{key} is not set"),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    /// Unlike [`Env::parse`], a set but unusable value is an error.
    fn ranged(&self, key: &str, default: u64, range: RangeInclusive<u64>) -> anyhow::Result<u64> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        let value: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{key}='{raw}' is not a number"))?;
        if !range.contains(&value) {
            bail!(
                "{key}={value} is out of range ({}..={})",
                range.start(),
                range.end()
            );
        }
        Ok(value)
    }
}
