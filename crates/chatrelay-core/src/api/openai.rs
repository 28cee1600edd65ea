//! [`AssistantsApi`] over the OpenAI Assistants v2 REST surface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{AssistantsApi, Role, ThreadMessage};
use crate::error::RelayError;
use crate::run::{ConversationContext, Run, RunSnapshot, RunStatus};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

/// Longest collaborator body echoed back in an error detail.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for threads, messages and runs.
#[derive(Clone)]
pub struct OpenAiAssistants {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiAssistants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistants")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiAssistants {
    /// Build a client. `request_timeout` bounds every single call.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::external("build_client", e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, RelayError> {
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::external(operation, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::external(operation, e))?;

        if !status.is_success() {
            return Err(RelayError::external(operation, error_detail(status, &body)));
        }
        debug!(operation, status = status.as_u16(), "assistants call ok");

        serde_json::from_str(&body).map_err(|e| {
            RelayError::external(operation, format!("unexpected response format: {e}"))
        })
    }
}

#[async_trait]
impl AssistantsApi for OpenAiAssistants {
    async fn create_context(&self) -> Result<ConversationContext, RelayError> {
        let thread: ObjectId = self
            .send("create_context", self.post("/threads").json(&json!({})))
            .await?;
        Ok(ConversationContext::new(thread.id))
    }

    async fn add_message(
        &self,
        context: &ConversationContext,
        role: Role,
        content: &str,
    ) -> Result<(), RelayError> {
        let path = format!("/threads/{}/messages", context.id);
        let _: ObjectId = self
            .send(
                "add_message",
                self.post(&path)
                    .json(&json!({ "role": role.as_ref(), "content": content })),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        context: &ConversationContext,
        agent_id: &str,
    ) -> Result<Run, RelayError> {
        let path = format!("/threads/{}/runs", context.id);
        let run: RunObject = self
            .send(
                "create_run",
                self.post(&path).json(&json!({ "assistant_id": agent_id })),
            )
            .await?;
        let snapshot = run.snapshot("create_run")?;
        let mut created = Run::new(run.id, &context.id, agent_id, RunStatus::Queued);
        created.observe(snapshot);
        Ok(created)
    }

    async fn get_run_status(
        &self,
        context_id: &str,
        run_id: &str,
    ) -> Result<RunSnapshot, RelayError> {
        let path = format!("/threads/{context_id}/runs/{run_id}");
        let run: RunObject = self.send("get_run_status", self.get(&path)).await?;
        run.snapshot("get_run_status")
    }

    async fn list_messages(&self, context_id: &str) -> Result<Vec<ThreadMessage>, RelayError> {
        let path = format!("/threads/{context_id}/messages?order=desc");
        let list: MessageList = self.send("list_messages", self.get(&path)).await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ThreadMessage {
                role: m.role.parse().unwrap_or(Role::Assistant),
                parts: m
                    .content
                    .into_iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.value),
                        ContentPart::Other => None,
                    })
                    .collect(),
            })
            .collect())
    }
}

// ── wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<ApiError>,
}

impl RunObject {
    fn snapshot(&self, operation: &'static str) -> Result<RunSnapshot, RelayError> {
        let status = match self.status.as_str() {
            "cancelling" => RunStatus::InProgress,
            "cancelled" | "expired" | "incomplete" | "requires_action" => {
                return Ok(RunSnapshot::failed(self.status.clone()));
            }
            other => other.parse::<RunStatus>().map_err(|_| {
                RelayError::external(operation, format!("unknown run status {other:?}"))
            })?,
        };
        if status == RunStatus::Failed {
            let reason = self
                .last_error
                .as_ref()
                .map(ApiError::describe)
                .unwrap_or_else(|| "failed".to_owned());
            return Ok(RunSnapshot::failed(reason));
        }
        Ok(RunSnapshot::new(status))
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "failed".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return format!("{status}: {}", envelope.error.describe());
    }
    let mut end = body.len().min(MAX_ERROR_BODY);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{status}: {}", &body[..end])
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;

    #[derive(Default)]
    struct Recorded {
        bodies: Vec<Value>,
        auth: Vec<String>,
        beta: Vec<String>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    fn record(state: &Shared, headers: &HeaderMap, body: Option<Value>) {
        let mut rec = state.lock().unwrap();
        if let Some(b) = body {
            rec.bodies.push(b);
        }
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        };
        rec.auth.push(header("authorization"));
        rec.beta.push(header("openai-beta"));
    }

    /// Serve a minimal threads/runs/messages API on an ephemeral port.
    async fn spawn_mock(run_status: &'static str) -> (String, Shared) {
        let shared: Shared = Arc::default();

        let app = Router::new()
            .route(
                "/v1/threads",
                post(|State(s): State<Shared>, h: HeaderMap, Json(b): Json<Value>| async move {
                    record(&s, &h, Some(b));
                    Json(serde_json::json!({ "id": "thread_1", "object": "thread" }))
                }),
            )
            .route(
                "/v1/threads/{tid}/messages",
                post(
                    |State(s): State<Shared>, h: HeaderMap, Json(b): Json<Value>| async move {
                        record(&s, &h, Some(b));
                        Json(serde_json::json!({ "id": "msg_1" }))
                    },
                )
                .get(|Path(tid): Path<String>| async move {
                    assert_eq!(tid, "thread_1");
                    Json(serde_json::json!({
                        "object": "list",
                        "data": [
                            { "id": "msg_2", "role": "assistant", "content": [
                                { "type": "text", "text": { "value": "hi ", "annotations": [] } },
                                { "type": "image_file", "image_file": { "file_id": "f" } },
                                { "type": "text", "text": { "value": "there", "annotations": [] } }
                            ]},
                            { "id": "msg_1", "role": "user", "content": [
                                { "type": "text", "text": { "value": "hello", "annotations": [] } }
                            ]}
                        ]
                    }))
                }),
            )
            .route(
                "/v1/threads/{tid}/runs",
                post(|State(s): State<Shared>, h: HeaderMap, Json(b): Json<Value>| async move {
                    record(&s, &h, Some(b));
                    Json(serde_json::json!({ "id": "run_1", "status": "queued" }))
                }),
            )
            .route(
                "/v1/threads/{tid}/runs/{rid}",
                get(move |Path((_, rid)): Path<(String, String)>| async move {
                    Json(serde_json::json!({
                        "id": rid,
                        "status": run_status,
                        "last_error": { "code": "server_error", "message": "Sorry, something went wrong." }
                    }))
                }),
            )
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1/"), shared)
    }

    fn client(base: &str) -> OpenAiAssistants {
        OpenAiAssistants::new("sk-test", base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn submits_thread_message_and_run() {
        let (base, rec) = spawn_mock("in_progress").await;
        let api = client(&base);

        let ctx = api.create_context().await.unwrap();
        assert_eq!(ctx.id, "thread_1");
        api.add_message(&ctx, Role::User, "hello").await.unwrap();
        let run = api.create_run(&ctx, "asst_1").await.unwrap();
        assert_eq!(run.id, "run_1");
        assert_eq!(run.status(), RunStatus::Queued);
        assert_eq!(run.agent_id, "asst_1");

        let rec = rec.lock().unwrap();
        assert_eq!(rec.bodies[1], serde_json::json!({ "role": "user", "content": "hello" }));
        assert_eq!(rec.bodies[2], serde_json::json!({ "assistant_id": "asst_1" }));
        assert!(rec.auth.iter().all(|a| a == "Bearer sk-test"));
        assert!(rec.beta.iter().all(|b| b == "assistants=v2"));
    }

    #[tokio::test]
    async fn reads_run_status() {
        let (base, _) = spawn_mock("in_progress").await;
        let snap = client(&base).get_run_status("thread_1", "run_1").await.unwrap();
        assert_eq!(snap, RunSnapshot::new(RunStatus::InProgress));
    }

    #[tokio::test]
    async fn failed_run_carries_last_error() {
        let (base, _) = spawn_mock("failed").await;
        let snap = client(&base).get_run_status("thread_1", "run_1").await.unwrap();
        assert_eq!(snap.status, RunStatus::Failed);
        assert_eq!(
            snap.failure.as_deref(),
            Some("server_error: Sorry, something went wrong.")
        );
    }

    #[tokio::test]
    async fn expired_run_folds_into_failed() {
        let (base, _) = spawn_mock("expired").await;
        let snap = client(&base).get_run_status("thread_1", "run_1").await.unwrap();
        assert_eq!(snap, RunSnapshot::failed("expired"));
    }

    #[tokio::test]
    async fn unknown_status_is_external_error() {
        let (base, _) = spawn_mock("paused").await;
        let err = client(&base).get_run_status("thread_1", "run_1").await.unwrap_err();
        assert!(matches!(err, RelayError::ExternalService { operation: "get_run_status", .. }));
    }

    #[tokio::test]
    async fn lists_text_parts_most_recent_first() {
        let (base, _) = spawn_mock("completed").await;
        let messages = client(&base).list_messages("thread_1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].parts, vec!["hi ", "there"]);
        assert_eq!(messages[1].role, Role::User);
    }

    #[tokio::test]
    async fn non_success_status_surfaces_collaborator_message() {
        let app = Router::new().route(
            "/v1/threads",
            post(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(serde_json::json!({
                        "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
                    })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = client(&format!("http://{addr}/v1"))
            .create_context()
            .await
            .unwrap_err();
        match err {
            RelayError::ExternalService { operation, detail } => {
                assert_eq!(operation, "create_context");
                assert!(detail.contains("401"), "{detail}");
                assert!(detail.contains("Incorrect API key provided"), "{detail}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn error_detail_truncates_raw_bodies() {
        let body = "x".repeat(2000);
        let detail = error_detail(StatusCode::BAD_GATEWAY, &body);
        assert!(detail.starts_with("502 Bad Gateway: "));
        assert!(detail.len() < 600);
    }
}
