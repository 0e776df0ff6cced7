//! Text classifier port - flags text that must not pass a pipeline boundary

/// Flags text on one side of generation
///
/// Used for provider output (leaked operator instructions, non-narrative
/// replies) and for player input (banned terms). The heuristic matchers are
/// the defaults; a model-based classifier can be swapped in without touching
/// the orchestrator or the routes.
pub trait TextClassifier: Send + Sync {
    fn is_flagged(&self, text: &str) -> bool;
}
