//! Prompt building functions for story-turn generation

use serde_json::json;

use crate::application::dto::{ContextBundle, ContextSource};
use crate::domain::entities::{Actor, TurnRecord};

/// Name of the function the provider is asked to call
pub const STORY_TURN_FUNCTION: &str = "generate_story_turn";

/// Build the system prompt establishing the narrator role and output contract
pub fn build_system_prompt() -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are an interactive storytelling AI that must remain consistent with the provided world facts. Avoid violence/explicit content.\n\n",
    );
    prompt.push_str("RESPONSE FORMAT:\n");
    prompt.push_str(&format!(
        "Always answer by calling {} with:\n",
        STORY_TURN_FUNCTION
    ));
    prompt.push_str("  - narrative: the next part of the story, in second person, without any instructions or meta commentary\n");
    prompt.push_str("  - options: two or three short actions the player could take next\n");
    prompt.push_str("  - facts: new facts the narrative establishes, each with kind (relation, possession, location, action, property), subject, predicate, object and certainty between 0 and 1\n");

    prompt
}

/// Build the user message from the retrieved context and the pending action
pub fn build_user_prompt(context: &ContextBundle, player_action: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("WORLD SUMMARY: {}\n\n", context.world_summary));

    let facts: Vec<&str> = context
        .items
        .iter()
        .filter(|item| item.source == ContextSource::Graph)
        .map(|item| item.text.as_str())
        .collect();
    if !facts.is_empty() {
        prompt.push_str("KNOWN FACTS:\n");
        for fact in facts {
            prompt.push_str(&format!("  - {}\n", fact));
        }
        prompt.push('\n');
    }

    let memories: Vec<&str> = context
        .items
        .iter()
        .filter(|item| item.source == ContextSource::Vector)
        .map(|item| item.text.as_str())
        .collect();
    if !memories.is_empty() {
        prompt.push_str("RELEVANT EARLIER EVENTS:\n");
        for memory in memories {
            prompt.push_str(&format!("  - {}\n", memory));
        }
        prompt.push('\n');
    }

    if !context.recent_turns.is_empty() {
        prompt.push_str("RECENT HISTORY:\n");
        for turn in &context.recent_turns {
            prompt.push_str(&format_turn(turn));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("PLAYER ACTION: \"{}\"\n", player_action.trim()));
    prompt
}

fn format_turn(turn: &TurnRecord) -> String {
    match turn.actor {
        Actor::Player => format!("Player: {}\n", turn.text),
        Actor::Narrator => format!("Narrator: {}\n", turn.text),
    }
}

/// JSON schema for the story-turn function call
pub fn story_turn_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "narrative": {
                "type": "string",
                "description": "Story continuation shown to the player"
            },
            "options": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 2,
                "maxItems": 3
            },
            "facts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kind": {
                            "type": "string",
                            "enum": ["relation", "possession", "location", "action", "property"]
                        },
                        "subject": { "type": "string" },
                        "predicate": { "type": "string" },
                        "object": { "type": "string" },
                        "certainty": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["kind", "subject", "predicate", "object", "certainty"]
                }
            }
        },
        "required": ["narrative", "options", "facts"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::ContextItem;

    #[test]
    fn test_user_prompt_groups_context_by_source() {
        let context = ContextBundle {
            items: vec![
                ContextItem {
                    key: "Player|is at|forest".to_string(),
                    text: "Player is at forest".to_string(),
                    source: ContextSource::Graph,
                    score: 1.0,
                    turn: 2,
                },
                ContextItem {
                    key: "The lantern flickers.".to_string(),
                    text: "The lantern flickers.".to_string(),
                    source: ContextSource::Vector,
                    score: 0.4,
                    turn: 1,
                },
            ],
            world_summary: "Characters: [Player]; Items: []; Locations: [forest]".to_string(),
            ..Default::default()
        };

        let prompt = build_user_prompt(&context, "  follow the light ");
        assert!(prompt.contains("KNOWN FACTS:\n  - Player is at forest"));
        assert!(prompt.contains("RELEVANT EARLIER EVENTS:\n  - The lantern flickers."));
        assert!(prompt.ends_with("PLAYER ACTION: \"follow the light\"\n"));
        assert!(!prompt.contains("RECENT HISTORY"));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = story_turn_schema();
        assert_eq!(schema["required"], json!(["narrative", "options", "facts"]));
        assert_eq!(schema["properties"]["options"]["maxItems"], 3);
    }
}
