//! Player-input filter - rejects actions containing banned terms
//!
//! Words are matched by prefix so inflections are caught ("killed",
//! "hateful") without flagging words that merely contain a term ("skill",
//! "whatever").

use crate::application::ports::outbound::TextClassifier;

const BANNED_TERMS: &[&str] = &["kill", "murder", "hate", "racist", "sexual"];

#[derive(Debug, Clone)]
pub struct BannedTermInputFilter {
    terms: Vec<String>,
}

impl Default for BannedTermInputFilter {
    fn default() -> Self {
        Self {
            terms: BANNED_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TextClassifier for BannedTermInputFilter {
    fn is_flagged(&self, text: &str) -> bool {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .any(|word| self.terms.iter().any(|term| word.starts_with(term.as_str())))
    }
}
