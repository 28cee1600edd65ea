use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Request bodies above this size are passed through without being logged.
const MAX_LOGGED_BODY: u64 = 4 * 1024;

pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");

        let req = if should_log_body(req.headers()) {
            let (parts, body) = req.into_parts();
            let bytes = buffer_and_log(body).await;
            Request::from_parts(parts, Body::from(bytes))
        } else {
            req
        };

        let mut response = next.run(req).await;

        if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        // Response bodies are never buffered: streamed replies must flow.
        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response head sent"
        );

        response
    }
    .instrument(span)
    .await
}

/// Only small JSON bodies with a declared length are worth logging.
fn should_log_body(headers: &HeaderMap) -> bool {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let small = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len <= MAX_LOGGED_BODY);
    is_json && small
}

async fn buffer_and_log(body: Body) -> Bytes {
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            match std::str::from_utf8(&bytes) {
                Ok(text) => info!(body = text, "request body"),
                Err(_) => info!(size = bytes.len(), "request body [non-utf8]"),
            }
            bytes
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Bytes::new()
        }
    }
}
