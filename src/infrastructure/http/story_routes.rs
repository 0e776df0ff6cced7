//! Story session routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::application::dto::TurnOutcome;
use crate::application::ports::outbound::PersistenceError;
use crate::domain::entities::{CredentialSnapshot, Session};
use crate::domain::value_objects::SessionId;
use crate::infrastructure::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlayerActionRequest {
    pub player_action: String,
}

type ApiError = (StatusCode, String);

fn parse_session_id(id: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid session ID".to_string()))
}

fn persistence_error(error: PersistenceError) -> ApiError {
    tracing::error!("Session store failure: {}", error);
    (StatusCode::SERVICE_UNAVAILABLE, error.to_string())
}

/// Play one turn
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PlayerActionRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let action = req.player_action.trim();
    if action.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "player_action must not be empty".to_string()));
    }
    if state.input_filter.is_flagged(action) {
        tracing::warn!(session_id = %session_id, "Player action rejected by input filter");
        return Err((StatusCode::BAD_REQUEST, "Input rejected by safety filter".to_string()));
    }

    state
        .turns
        .play_turn(session_id, action)
        .await
        .map(Json)
        .map_err(persistence_error)
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session_id = parse_session_id(&id)?;
    state
        .sessions
        .load(session_id)
        .await
        .map_err(persistence_error)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Session not found".to_string()))
}

/// Health of every provider credential
pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CredentialSnapshot>> {
    Json(state.pool.snapshot().await)
}
