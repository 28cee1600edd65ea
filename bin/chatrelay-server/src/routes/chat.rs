//! The `/chat` relay endpoint.
//!
//! `POST /chat` turns the message into an assistant run, waits for it to
//! finish, and answers either with `{"response": …}` or, when streaming,
//! with one JSON object per line under `text/event-stream`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use chatrelay_core::{ChatReply, ChatRequest, OutputChunk};
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::state::AppState;

/// Register the chat route.
///
/// `cors` wraps the POST handler only; `OPTIONS /chat` always gets the
/// fixed [`preflight`] answer.
pub fn router(cors: CorsLayer) -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat).layer(cors).options(preflight))
}

/// Fixed CORS pre-flight answer, independent of any business logic.
pub async fn preflight() -> impl IntoResponse {
    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
        Json(json!({ "message": "CORS preflight successful" })),
    )
}

/// Relay one chat message (`POST /chat`).
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let request = match payload {
        Ok(Json(request)) => Some(request),
        Err(rejection) => {
            warn!(error = %rejection, "undecodable chat body");
            None
        }
    };

    let cancel = state.shutdown.child_token();
    match state.relay.handle(request, cancel).await? {
        ChatReply::Complete(text) => Ok(Json(json!({ "response": text })).into_response()),
        ChatReply::Stream(chunks) => {
            let lines = chunks.map(|chunk| encode_line(&chunk));
            Ok((
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(lines),
            )
                .into_response())
        }
    }
}

/// One newline-terminated JSON object per chunk.
fn encode_line(chunk: &OutputChunk) -> Result<Bytes, serde_json::Error> {
    if chunk.is_error() {
        info!("stream closed with error marker");
    }
    let mut line = serde_json::to_vec(chunk)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
