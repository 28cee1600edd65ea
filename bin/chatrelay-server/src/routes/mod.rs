//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Info and health routes
//! - The `/chat` relay endpoint

pub mod chat;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let cors = cors::cors_layer(state.clone());
    Router::new()
        .merge(health::router().layer(cors.clone()))
        .merge(chat::router(cors))
        // Outermost layers execute first on the way in.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
