//! Story session - turn history plus the world state it has built up

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::world_state::WorldState;
use crate::domain::value_objects::SessionId;

/// Opening narration for a session created without an explicit seed
pub const DEFAULT_SEED: &str = "You wake up in a misty forest. The air is heavy with fog. In the distance, a flickering lantern glows faintly.";

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Player,
    Narrator,
}

/// A single entry in the session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Position of this entry in the history
    pub turn_id: u64,
    pub actor: Actor,
    pub text: String,
    /// Choices offered after a narrator entry; empty for player entries
    #[serde(default)]
    pub options: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A story session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub history: Vec<TurnRecord>,
    pub world: WorldState,
    /// Number of completed player turns
    pub turn_counter: u64,
}

impl Session {
    /// Create a session seeded with the default opening narration
    pub fn new(id: SessionId) -> Self {
        Self::with_seed(id, DEFAULT_SEED)
    }

    pub fn with_seed(id: SessionId, seed: &str) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            created_at,
            history: vec![TurnRecord {
                turn_id: 0,
                actor: Actor::Narrator,
                text: seed.to_string(),
                options: Vec::new(),
                timestamp: created_at,
            }],
            world: WorldState::new(),
            turn_counter: 0,
        }
    }

    /// Append a completed turn (player action followed by narration)
    ///
    /// Returns the new turn counter.
    pub fn append_turn(&mut self, player_action: &str, narrative: &str, options: &[String]) -> u64 {
        let now = Utc::now();
        self.push(Actor::Player, player_action, Vec::new(), now);
        self.push(Actor::Narrator, narrative, options.to_vec(), now);
        self.turn_counter += 1;
        self.turn_counter
    }

    /// The last `window` history entries, oldest first
    pub fn recent_turns(&self, window: usize) -> &[TurnRecord] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    fn push(&mut self, actor: Actor, text: &str, options: Vec<String>, timestamp: DateTime<Utc>) {
        let turn_id = self.history.last().map_or(0, |turn| turn.turn_id + 1);
        self.history.push(TurnRecord {
            turn_id,
            actor,
            text: text.to_string(),
            options,
            timestamp,
        });
    }
}
