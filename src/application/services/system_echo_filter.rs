//! System-echo filter - phrase heuristics for leaked operator instructions
//!
//! Models sometimes answer with (part of) the instructions they were given
//! instead of narrative. Text is flagged when it contains any signal phrase,
//! compared case-insensitively. Empty text is always flagged.

use crate::application::ports::outbound::TextClassifier;

const DEFAULT_SIGNALS: &[&str] = &[
    "you are an interactive storytelling ai",
    "you are a storytelling",
    "remain consistent with",
    "must remain consistent",
    "provided world facts",
    "avoid violence",
    "avoid explicit",
    "system:",
    "instruction:",
    "(local)",
    "(system)",
    "you must",
];

#[derive(Debug, Clone)]
pub struct PhraseEchoFilter {
    signals: Vec<String>,
}

impl Default for PhraseEchoFilter {
    fn default() -> Self {
        Self {
            signals: DEFAULT_SIGNALS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextClassifier for PhraseEchoFilter {
    fn is_flagged(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return true;
        }
        self.signals.iter().any(|signal| lowered.contains(signal.as_str()))
    }
}
