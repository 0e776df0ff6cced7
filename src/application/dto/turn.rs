use serde::Serialize;

use super::generation::FallbackReason;
use crate::domain::value_objects::SessionId;

/// Steps of one turn, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Start,
    Retrieving,
    Generating,
    Validating,
    Merging,
    Persisted,
    /// Fallback content was used; the turn still completes
    Degraded,
}

/// What a completed turn returns to the caller
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub turn: u64,
    pub narrative: String,
    pub options: Vec<String>,
    pub facts_applied: usize,
    pub facts_skipped: usize,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    /// Phases the turn went through
    pub phases: Vec<TurnPhase>,
}
