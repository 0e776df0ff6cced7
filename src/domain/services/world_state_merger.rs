//! World-state merger - applies extracted facts to a session's world model
//!
//! Merging is idempotent: applying a fact that the world already reflects is
//! a structural no-op, and its ledger certainty becomes the max of the
//! certainties seen. A fact that contradicts current state (a new owner for
//! an owned item, a new location for a placed character) wins.
//!
//! Facts below the certainty gate are logged in the ledger but never touch
//! the node maps or relation edges.

use serde::Serialize;

use crate::domain::entities::{LedgerEntry, RelationEdge, WorldState};
use crate::domain::value_objects::{Fact, FactKind};

/// Predicates that move an item into the subject's possession
const TAKE_PREDICATES: &[&str] = &[
    "owns",
    "acquires",
    "has",
    "holds",
    "takes",
    "picks up",
    "receives",
    "carries",
];

/// Predicates that end the subject's possession of an item
const RELEASE_PREDICATES: &[&str] = &["drops", "loses", "discards", "gives away"];

/// Predicates that make an item known without anyone owning it
const DISCOVER_PREDICATES: &[&str] = &["discovers", "finds", "notices", "sees", "uncovers"];

/// Predicates that place the subject somewhere
const PLACE_PREDICATES: &[&str] = &[
    "is at",
    "is in",
    "location",
    "enters",
    "moves to",
    "goes to",
    "arrives at",
];

/// Why a fact produced no structural change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    BelowThreshold { certainty: f64, threshold: f64 },
    Malformed { detail: String },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelowThreshold { .. } => "below_threshold",
            Self::Malformed { .. } => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFact {
    pub fact: Fact,
    pub reason: SkipReason,
}

/// Which facts were applied and which were skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub applied: Vec<Fact>,
    pub skipped: Vec<SkippedFact>,
}

/// Applies facts to a `WorldState`
#[derive(Debug, Clone, Copy)]
pub struct WorldStateMerger {
    min_certainty: f64,
}

impl Default for WorldStateMerger {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl WorldStateMerger {
    pub fn new(min_certainty: f64) -> Self {
        Self {
            min_certainty: min_certainty.clamp(0.0, 1.0),
        }
    }

    /// Merge into a copy of `world`, leaving the original untouched
    pub fn merge(&self, world: &WorldState, facts: Vec<Fact>) -> (WorldState, MergeOutcome) {
        let mut next = world.clone();
        let outcome = self.apply(&mut next, facts);
        (next, outcome)
    }

    /// Merge facts in order into `world`
    pub fn apply(&self, world: &mut WorldState, facts: Vec<Fact>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for fact in facts {
            if let Err(e) = fact.validate() {
                outcome.skipped.push(SkippedFact {
                    fact,
                    reason: SkipReason::Malformed {
                        detail: e.to_string(),
                    },
                });
                continue;
            }

            let passes_gate = fact.certainty >= self.min_certainty;
            record_in_ledger(world, &fact, passes_gate);

            if passes_gate {
                apply_edge(world, &fact);
                outcome.applied.push(fact);
            } else {
                let reason = SkipReason::BelowThreshold {
                    certainty: fact.certainty,
                    threshold: self.min_certainty,
                };
                outcome.skipped.push(SkippedFact { fact, reason });
            }
        }

        outcome
    }
}

fn record_in_ledger(world: &mut WorldState, fact: &Fact, applied: bool) {
    let key = fact.key();
    world
        .ledger
        .entry(key.to_string())
        .and_modify(|entry| {
            entry.certainty = entry.certainty.max(fact.certainty);
            entry.applied |= applied;
        })
        .or_insert_with(|| LedgerEntry {
            kind: fact.kind,
            subject: key.subject.clone(),
            predicate: key.predicate.clone(),
            object: key.object.clone(),
            certainty: fact.certainty,
            applied,
        });
}

fn apply_edge(world: &mut WorldState, fact: &Fact) {
    let key = fact.key();
    let subject = key.subject.as_str();
    let predicate = key.predicate.as_str();
    let object = key.object.as_str();
    let has = |list: &[&str]| list.contains(&predicate);

    match fact.kind {
        FactKind::Possession if has(RELEASE_PREDICATES) => release_item(world, subject, object),
        FactKind::Possession if has(DISCOVER_PREDICATES) => discover_item(world, subject, object),
        FactKind::Possession => give_item(world, subject, object),
        FactKind::Location => place(world, subject, object),
        FactKind::Relation => {
            world.ensure_character(subject);
            world.ensure_character(object);
            world.relations.insert(RelationEdge {
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                object: object.to_string(),
            });
        }
        FactKind::Property => {
            world.ensure_character(subject).traits.insert(object.to_string());
        }
        // The kind is loose but the predicate may still be one we understand
        FactKind::Action | FactKind::Other => {
            if has(TAKE_PREDICATES) {
                give_item(world, subject, object);
            } else if has(RELEASE_PREDICATES) {
                release_item(world, subject, object);
            } else if has(PLACE_PREDICATES) {
                place(world, subject, object);
            } else {
                world.ensure_character(subject);
            }
        }
    }
}

fn give_item(world: &mut WorldState, owner: &str, item: &str) {
    world.ensure_character(owner);
    let node = world.ensure_item(item);
    let previous_owner = node.owner.replace(owner.to_string());
    let previous_location = node.location.take();

    if let Some(previous) = previous_owner.filter(|previous| previous != owner) {
        if let Some(character) = world.characters.get_mut(&previous) {
            character.held_items.remove(item);
        }
    }
    if let Some(location) = previous_location {
        if let Some(location) = world.locations.get_mut(&location) {
            location.items.remove(item);
        }
    }
    world.ensure_character(owner).held_items.insert(item.to_string());
}

/// The item stays where its former owner stands
fn release_item(world: &mut WorldState, owner: &str, item: &str) {
    let owner_location = world.ensure_character(owner).location.clone();
    let node = world.ensure_item(item);
    if node.owner.as_deref() != Some(owner) {
        return;
    }
    node.owner = None;
    node.location = owner_location.clone();

    world.ensure_character(owner).held_items.remove(item);
    if let Some(location) = owner_location {
        world.ensure_location(&location).items.insert(item.to_string());
    }
}

/// Creates the item; an unowned, unplaced item lands where the finder stands
fn discover_item(world: &mut WorldState, finder: &str, item: &str) {
    let finder_location = world.ensure_character(finder).location.clone();
    let node = world.ensure_item(item);
    if node.owner.is_some() || node.location.is_some() {
        return;
    }
    if let Some(location) = finder_location {
        node.location = Some(location.clone());
        world.ensure_location(&location).items.insert(item.to_string());
    }
}

fn place(world: &mut WorldState, subject: &str, location: &str) {
    let is_item = world.items.contains_key(subject) && !world.characters.contains_key(subject);
    if is_item {
        place_item(world, subject, location);
    } else {
        move_character(world, subject, location);
    }
}

fn move_character(world: &mut WorldState, name: &str, location: &str) {
    let previous = world.ensure_character(name).location.replace(location.to_string());
    if let Some(previous) = previous.filter(|previous| previous != location) {
        if let Some(node) = world.locations.get_mut(&previous) {
            node.occupants.remove(name);
        }
    }
    world.ensure_location(location).occupants.insert(name.to_string());
}

fn place_item(world: &mut WorldState, item: &str, location: &str) {
    let node = world.ensure_item(item);
    let previous_owner = node.owner.take();
    let previous_location = node.location.replace(location.to_string());

    if let Some(owner) = previous_owner {
        if let Some(character) = world.characters.get_mut(&owner) {
            character.held_items.remove(item);
        }
    }
    if let Some(previous) = previous_location.filter(|previous| previous != location) {
        if let Some(node) = world.locations.get_mut(&previous) {
            node.items.remove(item);
        }
    }
    world.ensure_location(location).items.insert(item.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn possession(subject: &str, object: &str, certainty: f64) -> Fact {
        Fact::new(FactKind::Possession, subject, "acquires", object, certainty)
    }

    fn location(subject: &str, object: &str, certainty: f64) -> Fact {
        Fact::new(FactKind::Location, subject, "is at", object, certainty)
    }

    /// Everything except the ledger
    fn structure(world: &WorldState) -> WorldState {
        WorldState {
            ledger: Default::default(),
            ..world.clone()
        }
    }

    #[test]
    fn test_reapplying_fact_keeps_single_owner_and_max_certainty() {
        let merger = WorldStateMerger::new(0.5);
        let mut world = WorldState::new();

        merger.apply(&mut world, vec![possession("Alice", "key", 0.9)]);
        let once = structure(&world);
        merger.apply(&mut world, vec![possession("Alice", "key", 0.95)]);

        assert_eq!(structure(&world), once);
        assert_eq!(world.items["key"].owner.as_deref(), Some("Alice"));
        assert_eq!(world.characters["Alice"].held_items.len(), 1);
        assert_eq!(world.ledger.len(), 1);
        assert_eq!(world.ledger["Alice|acquires|key"].certainty, 0.95);
    }

    #[test]
    fn test_lower_certainty_repeat_keeps_max() {
        let merger = WorldStateMerger::new(0.5);
        let mut world = WorldState::new();
        merger.apply(&mut world, vec![possession("Alice", "key", 0.9)]);
        merger.apply(&mut world, vec![possession("Alice", "key", 0.7)]);
        assert_eq!(world.ledger["Alice|acquires|key"].certainty, 0.9);
    }

    #[test]
    fn test_below_threshold_is_logged_but_not_applied() {
        let merger = WorldStateMerger::new(0.5);
        let world = WorldState::new();

        let (next, outcome) = merger.merge(&world, vec![possession("Alice", "key", 0.3)]);

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason.as_str(), "below_threshold");
        assert_eq!(structure(&next), structure(&world));
        let entry = &next.ledger["Alice|acquires|key"];
        assert!(!entry.applied);
        assert_eq!(entry.certainty, 0.3);
    }

    #[test]
    fn test_malformed_fact_is_skipped() {
        let merger = WorldStateMerger::default();
        let (next, outcome) = merger.merge(
            &WorldState::new(),
            vec![Fact::new(FactKind::Possession, "", "acquires", "key", 0.9)],
        );
        assert_eq!(outcome.skipped[0].reason.as_str(), "malformed");
        assert_eq!(next, WorldState::new());
    }

    #[test]
    fn test_new_owner_wins_and_leaves_previous_holder() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![possession("Alice", "key", 0.9), possession("Bob", "key", 0.8)],
        );

        assert_eq!(world.items["key"].owner.as_deref(), Some("Bob"));
        assert!(world.characters["Alice"].held_items.is_empty());
        assert!(world.characters["Bob"].held_items.contains("key"));
        assert_eq!(world.ledger.len(), 2);
    }

    #[test]
    fn test_move_updates_both_locations() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![location("Player", "forest", 0.7), location("Player", "cave", 0.7)],
        );

        assert_eq!(world.characters["Player"].location.as_deref(), Some("cave"));
        assert!(world.locations["forest"].occupants.is_empty());
        assert!(world.locations["cave"].occupants.contains("Player"));
    }

    #[test]
    fn test_location_fact_for_known_item_places_it() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![possession("Alice", "lantern", 0.9), location("lantern", "altar", 0.8)],
        );

        assert_eq!(world.items["lantern"].owner, None);
        assert_eq!(world.items["lantern"].location.as_deref(), Some("altar"));
        assert!(world.locations["altar"].items.contains("lantern"));
        assert!(world.characters["Alice"].held_items.is_empty());
        assert!(!world.characters.contains_key("lantern"));
    }

    #[test]
    fn test_relation_creates_both_characters_and_an_edge() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![Fact::new(FactKind::Relation, "Player", "Meets", "old hermit", 0.8)],
        );

        assert!(world.characters.contains_key("Player"));
        assert!(world.characters.contains_key("old hermit"));
        assert!(world.relations.contains(&RelationEdge {
            subject: "Player".to_string(),
            predicate: "meets".to_string(),
            object: "old hermit".to_string(),
        }));
    }

    #[test]
    fn test_drop_leaves_item_at_owner_location() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![
                location("Player", "bridge", 0.9),
                possession("Player", "rope", 0.9),
                Fact::new(FactKind::Possession, "Player", "drops", "rope", 0.9),
            ],
        );

        assert_eq!(world.items["rope"].owner, None);
        assert_eq!(world.items["rope"].location.as_deref(), Some("bridge"));
        assert!(world.locations["bridge"].items.contains("rope"));
    }

    #[test]
    fn test_discovery_does_not_transfer_ownership() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![
                location("Player", "ruins", 0.9),
                Fact::new(FactKind::Possession, "Player", "discovers", "amulet", 0.5),
            ],
        );

        assert_eq!(world.items["amulet"].owner, None);
        assert!(world.locations["ruins"].items.contains("amulet"));
    }

    #[test]
    fn test_property_adds_trait() {
        let merger = WorldStateMerger::default();
        let mut world = WorldState::new();
        merger.apply(
            &mut world,
            vec![Fact::new(FactKind::Property, "Alice", "is", "brave", 0.6)],
        );
        assert!(world.characters["Alice"].traits.contains("brave"));
    }
}
