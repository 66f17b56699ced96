//! Axum Router Configuration
//!
//! Two routes: the secret-guarded test-call trigger and the media-stream
//! WebSocket endpoint. Everything else is a plain 404.

use crate::{handlers, state::AppState};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/test", get(handlers::test_call))
        .route("/media-stream", get(handlers::media_stream))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
