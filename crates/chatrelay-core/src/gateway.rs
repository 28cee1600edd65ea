//! Inbound payload validation. Runs before any collaborator call.

use serde::Deserialize;

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Decoded `POST /chat` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "agentId")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
}

/// A request that passed validation, with every default resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChat {
    pub message: String,
    pub agent_id: String,
    pub stream: bool,
}

/// Check shape and allow-list membership.
///
/// `None` stands for a body that was absent or could not be decoded.
pub fn validate(
    request: Option<ChatRequest>,
    config: &RelayConfig,
) -> Result<ValidatedChat, RelayError> {
    let request = request.ok_or_else(|| RelayError::InvalidRequest("missing body".into()))?;

    let message = match request.message {
        Some(m) if !m.trim().is_empty() => m,
        Some(_) => return Err(RelayError::InvalidRequest("empty message".into())),
        None => return Err(RelayError::InvalidRequest("missing message".into())),
    };

    let agent_id = match request.agent_id {
        Some(id) if config.is_allowed(&id) => id,
        Some(id) => return Err(RelayError::UnknownAgent(id)),
        None => config.default_agent().to_owned(),
    };

    Ok(ValidatedChat {
        message,
        agent_id,
        stream: request.stream.unwrap_or(config.stream.stream_by_default),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> RelayConfig {
        RelayConfig::new("asst_default").with_allowed_agents(["asst_math"])
    }

    fn request(message: Option<&str>, agent: Option<&str>) -> Option<ChatRequest> {
        Some(ChatRequest {
            message: message.map(str::to_owned),
            agent_id: agent.map(str::to_owned),
            stream: None,
        })
    }

    #[test]
    fn default_agent_fills_in() {
        let ok = validate(request(Some("hello"), None), &config()).unwrap();
        assert_eq!(ok.agent_id, "asst_default");
        assert_eq!(ok.message, "hello");
        assert!(!ok.stream);
    }

    #[test]
    fn listed_agent_is_accepted() {
        let ok = validate(request(Some("2+2?"), Some("asst_math")), &config()).unwrap();
        assert_eq!(ok.agent_id, "asst_math");
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let err = validate(request(Some("hello"), Some("bad-id")), &config()).unwrap_err();
        assert!(matches!(err, RelayError::UnknownAgent(id) if id == "bad-id"));
    }

    #[test]
    fn missing_or_blank_message_is_invalid() {
        for req in [None, request(None, None), request(Some(""), None), request(Some(" \n"), None)] {
            let err = validate(req, &config()).unwrap_err();
            assert_eq!(err.kind(), "invalid_request");
        }
    }

    #[test]
    fn message_is_checked_before_agent() {
        let err = validate(request(None, Some("bad-id")), &config()).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn body_uses_camel_case_agent_id() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","agentId":"asst_math","stream":true}"#).unwrap();
        assert_eq!(req.agent_id.as_deref(), Some("asst_math"));
        assert_eq!(req.stream, Some(true));

        let empty: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ChatRequest::default());
    }
}
