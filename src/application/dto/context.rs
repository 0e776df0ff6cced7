use serde::Serialize;

use crate::domain::entities::TurnRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// A fact touching an entity in play
    Graph,
    /// A prior narrative fragment similar to the action
    Vector,
}

/// One retrieved piece of context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextItem {
    /// Identity used for deduplication (fact key or fragment text)
    pub key: String,
    pub text: String,
    pub source: ContextSource,
    pub score: f64,
    /// Turn that produced this item; higher is more recent
    pub turn: u64,
}

/// Everything the prompt builder needs for the next generation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextBundle {
    /// Ranked, deduplicated and truncated retrieval results
    pub items: Vec<ContextItem>,
    pub recent_turns: Vec<TurnRecord>,
    pub world_summary: String,
    /// Sources that failed or timed out and were left out
    pub degraded_sources: Vec<ContextSource>,
}

impl ContextBundle {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }
}
