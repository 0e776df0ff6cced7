//! HTTP REST API routes

mod story_routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::infrastructure::state::AppState;

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/{id}", get(story_routes::get_session))
        .route("/sessions/{id}/actions", post(story_routes::submit_action))
        .route("/credentials", get(story_routes::list_credentials))
}
