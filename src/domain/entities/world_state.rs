//! World state - the structured model of characters, items and locations
//!
//! Owned by a session. Only the world-state merger mutates it; retrieval and
//! the turn controller read it. Every name referenced by an edge exists as a
//! node, created on first reference.
//!
//! Ordered maps keep the serialized form stable, so two states that hold the
//! same facts compare and persist identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::FactKind;

/// A character node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterNode {
    pub location: Option<String>,
    pub held_items: BTreeSet<String>,
    /// Free-text characteristics ("is brave", "wears a red cloak")
    pub traits: BTreeSet<String>,
}

/// An item node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemNode {
    pub owner: Option<String>,
    /// Where the item lies when nobody holds it
    pub location: Option<String>,
}

/// A location node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationNode {
    pub occupants: BTreeSet<String>,
    pub items: BTreeSet<String>,
}

/// Free-form edge between two characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationEdge {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Every fact the world has seen, keyed by its triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: FactKind,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// Highest certainty observed for this triple
    pub certainty: f64,
    /// Whether the triple ever cleared the certainty gate
    pub applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    pub characters: BTreeMap<String, CharacterNode>,
    pub items: BTreeMap<String, ItemNode>,
    pub locations: BTreeMap<String, LocationNode>,
    pub relations: BTreeSet<RelationEdge>,
    pub ledger: BTreeMap<String, LedgerEntry>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_character(&mut self, name: &str) -> &mut CharacterNode {
        self.characters.entry(name.to_string()).or_default()
    }

    pub fn ensure_item(&mut self, name: &str) -> &mut ItemNode {
        self.items.entry(name.to_string()).or_default()
    }

    pub fn ensure_location(&mut self, name: &str) -> &mut LocationNode {
        self.locations.entry(name.to_string()).or_default()
    }

    /// All node names, characters first, then items, then locations
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.characters
            .keys()
            .chain(self.items.keys())
            .chain(self.locations.keys())
            .map(String::as_str)
    }

    /// The location `name` is in, plus everyone and everything else there
    pub fn colocated_with(&self, name: &str) -> Vec<String> {
        let Some(location_name) = self
            .characters
            .get(name)
            .and_then(|character| character.location.as_ref())
        else {
            return Vec::new();
        };

        let mut entities = vec![location_name.clone()];
        if let Some(location) = self.locations.get(location_name) {
            entities.extend(
                location
                    .occupants
                    .iter()
                    .filter(|occupant| occupant.as_str() != name)
                    .cloned(),
            );
            entities.extend(location.items.iter().cloned());
        }
        entities
    }

    /// One-line inventory of known entities for prompt construction
    pub fn summary(&self) -> String {
        let join = |names: Vec<&String>| {
            names
                .into_iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "Characters: [{}]; Items: [{}]; Locations: [{}]",
            join(self.characters.keys().collect()),
            join(self.items.keys().collect()),
            join(self.locations.keys().collect()),
        )
    }
}
