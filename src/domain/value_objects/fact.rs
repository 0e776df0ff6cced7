//! Facts - typed (subject, predicate, object) assertions extracted from narrative
//!
//! A fact is produced once (by the provider or the heuristic extractor),
//! never edited, and consumed by the world-state merger.

use serde::{Deserialize, Serialize};

/// Category of a fact, which decides how the merger interprets it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    /// Social edge between two characters (meets, talks to, ...)
    #[serde(alias = "relationship")]
    Relation,
    /// A character holds an item
    Possession,
    /// A character (or item) is somewhere
    Location,
    /// Something a character did
    Action,
    /// A characteristic of a character
    Property,
    /// Any kind the model invents that we do not model explicitly
    #[serde(other)]
    Other,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relation => "relation",
            Self::Possession => "possession",
            Self::Location => "location",
            Self::Action => "action",
            Self::Property => "property",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed assertion with a confidence value
///
/// Accepts the legacy wire field name `type` for `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(alias = "type")]
    pub kind: FactKind,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub certainty: f64,
}

impl Fact {
    pub fn new(
        kind: FactKind,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        certainty: f64,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            certainty,
        }
    }

    /// Check the shape invariants: non-empty fields, certainty in [0, 1]
    pub fn validate(&self) -> Result<(), FactValidationError> {
        if self.subject.trim().is_empty() {
            return Err(FactValidationError::EmptyField("subject"));
        }
        if self.predicate.trim().is_empty() {
            return Err(FactValidationError::EmptyField("predicate"));
        }
        if self.object.trim().is_empty() {
            return Err(FactValidationError::EmptyField("object"));
        }
        if !(0.0..=1.0).contains(&self.certainty) {
            return Err(FactValidationError::CertaintyOutOfRange(self.certainty));
        }
        Ok(())
    }

    /// Predicate lowercased with internal whitespace collapsed (`"Is  At"` -> `"is at"`)
    pub fn normalized_predicate(&self) -> String {
        normalize_predicate(&self.predicate)
    }

    /// Identity of the fact, independent of its certainty
    pub fn key(&self) -> FactKey {
        FactKey {
            subject: self.subject.trim().to_string(),
            predicate: self.normalized_predicate(),
            object: self.object.trim().to_string(),
        }
    }

    /// Human-readable one-liner used in prompts and vector fragments
    pub fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.subject.trim(),
            self.normalized_predicate(),
            self.object.trim()
        )
    }
}

/// Identity of a fact: the (subject, predicate, object) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.subject, self.predicate, self.object)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactValidationError {
    #[error("fact field '{0}' is empty")]
    EmptyField(&'static str),
    #[error("certainty {0} is outside [0, 1]")]
    CertaintyOutOfRange(f64),
}

fn normalize_predicate(predicate: &str) -> String {
    predicate
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
