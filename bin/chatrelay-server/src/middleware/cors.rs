use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::state::AppState;

/// Methods and headers the chat endpoint accepts cross-origin.
pub const ALLOWED_METHODS: [Method; 2] = [Method::POST, Method::OPTIONS];

pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let origin: AllowOrigin = match &state.config.cors_allowed_origins {
        Some(origins_str) => {
            let origins: Vec<HeaderValue> = origins_str
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                Any.into()
            } else {
                origins.into()
            }
        }
        // Wildcard unless RELAY_CORS_ORIGINS narrows it.
        None => Any.into(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(ALLOWED_METHODS.to_vec())
        .allow_headers([header::CONTENT_TYPE])
}
