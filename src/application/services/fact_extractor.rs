//! Heuristic fact extraction from player actions
//!
//! Used on degraded turns, where no provider facts exist, so explicit player
//! actions ("pick up the lantern", "go to the old mill") still reach the world
//! model. Certainties are deliberately modest; the merger's certainty gate
//! decides which of them become canon.

use crate::domain::value_objects::{Fact, FactKind};

/// Subject used for facts about the acting player
pub const PLAYER: &str = "Player";

struct Pattern {
    phrases: &'static [&'static str],
    kind: FactKind,
    predicate: &'static str,
    certainty: f64,
}

const PATTERNS: &[Pattern] = &[
    Pattern {
        phrases: &[
            "pick up", "picks up", "grab", "grabs", "take", "takes", "retrieve", "pocket", "lift",
        ],
        kind: FactKind::Possession,
        predicate: "acquires",
        certainty: 0.6,
    },
    Pattern {
        phrases: &["discover", "discovers", "find", "finds", "uncover", "uncovers"],
        kind: FactKind::Possession,
        predicate: "discovers",
        certainty: 0.5,
    },
    Pattern {
        phrases: &[
            "go to", "goes to", "walk to", "walks to", "head to", "move to", "enter", "enters",
        ],
        kind: FactKind::Location,
        predicate: "is at",
        certainty: 0.7,
    },
    Pattern {
        phrases: &["meet", "meets", "encounter", "encounters"],
        kind: FactKind::Relation,
        predicate: "meets",
        certainty: 0.8,
    },
    Pattern {
        phrases: &["talk to", "talks to", "talk with", "speak to", "speak with"],
        kind: FactKind::Relation,
        predicate: "talks to",
        certainty: 0.7,
    },
];

const ARTICLES: &[&str] = &["the", "a", "an", "some", "my", "that", "this"];

const OBJECT_STOP_WORDS: &[&str] =
    &["and", "then", "before", "after", "while", "quickly", "carefully"];

/// Scenery that is found but cannot be possessed
const SCENERY: &[&str] = &[
    "roots", "ground", "floor", "earth", "path", "way", "direction", "route", "trail",
];

const MAX_OBJECT_WORDS: usize = 3;

/// At most one fact per pattern, in pattern order
pub fn extract_facts(action: &str) -> Vec<Fact> {
    let clauses: Vec<Vec<String>> = action
        .split(|c: char| matches!(c, ',' | '.' | ';' | '!' | '?'))
        .map(tokenize)
        .filter(|words| !words.is_empty())
        .collect();

    PATTERNS
        .iter()
        .filter_map(|pattern| {
            let object = clauses
                .iter()
                .find_map(|words| object_after(words, pattern.phrases))?;
            if pattern.predicate == "discovers" && SCENERY.contains(&object.as_str()) {
                return None;
            }
            Some(Fact::new(
                pattern.kind,
                PLAYER,
                pattern.predicate,
                object,
                pattern.certainty,
            ))
        })
        .collect()
}

fn tokenize(clause: &str) -> Vec<String> {
    clause
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn object_after(words: &[String], phrases: &[&str]) -> Option<String> {
    phrases.iter().find_map(|phrase| {
        let needle: Vec<&str> = phrase.split(' ').collect();
        let start = words
            .windows(needle.len())
            .position(|window| window.iter().zip(&needle).all(|(w, n)| w == n))?;

        let object: Vec<&str> = words[start + needle.len()..]
            .iter()
            .map(String::as_str)
            .skip_while(|word| ARTICLES.contains(word))
            .take_while(|word| !OBJECT_STOP_WORDS.contains(word))
            .take(MAX_OBJECT_WORDS)
            .collect();

        (!object.is_empty()).then(|| object.join(" "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_up_yields_possession() {
        let facts = extract_facts("I pick up the rusty lantern.");
        assert_eq!(
            facts,
            vec![Fact::new(FactKind::Possession, PLAYER, "acquires", "rusty lantern", 0.6)]
        );
    }

    #[test]
    fn test_movement_and_meeting_in_one_action() {
        let facts = extract_facts("Go to the old mill and meet the miller");
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].kind, FactKind::Location);
        assert_eq!(facts[0].object, "old mill");
        assert_eq!(facts[1].predicate, "meets");
        assert_eq!(facts[1].object, "miller");
        assert_eq!(facts[1].certainty, 0.8);
    }

    #[test]
    fn test_words_inside_other_words_do_not_match() {
        assert!(extract_facts("Admit the mistake").is_empty());
    }

    #[test]
    fn test_scenery_is_not_discovered() {
        assert!(extract_facts("find the path").is_empty());
        let facts = extract_facts("find a silver key");
        assert_eq!(facts[0].object, "silver key");
        assert_eq!(facts[0].certainty, 0.5);
    }

    #[test]
    fn test_plain_action_yields_nothing() {
        assert!(extract_facts("Look around").is_empty());
    }
}
