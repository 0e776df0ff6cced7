//! Engine events - structured observability records
//!
//! Emitted by the credential pool, the generation orchestrator and the turn
//! controller through the `EventSink` port. Each variant has a stable dotted
//! name that log and metrics consumers key on.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{CredentialId, FailureKind, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    // ========================================================================
    // Credential Events
    // ========================================================================
    /// A generation attempt failed against a credential
    CredentialFailure {
        id: CredentialId,
        kind: FailureKind,
    },

    /// A credential's circuit opened (or re-opened after a failed trial)
    CredentialOpened {
        id: CredentialId,
        cooldown: Duration,
        until: DateTime<Utc>,
    },

    // ========================================================================
    // Generation Events
    // ========================================================================
    /// A provider call is about to be issued
    GenerationAttempt {
        attempt: u32,
        credential: CredentialId,
    },

    /// The orchestrator is retrying after a failed attempt
    GenerationRetry {
        attempt: u32,
        reason: FailureKind,
    },

    /// Local fallback content was returned instead of provider output
    FallbackUsed { reason: String },

    /// The echo filter flagged a narrative
    EchoDetected { credential: CredentialId },

    // ========================================================================
    // World Events
    // ========================================================================
    FactsMerged {
        session_id: SessionId,
        count: usize,
    },

    FactsSkipped {
        session_id: SessionId,
        count: usize,
        reason: String,
    },

    /// A turn completed with fallback content
    TurnDegraded {
        session_id: SessionId,
        reason: String,
    },
}

impl EngineEvent {
    /// Stable dotted name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::CredentialFailure { .. } => "credential.failure",
            Self::CredentialOpened { .. } => "credential.opened",
            Self::GenerationAttempt { .. } => "generation.attempt",
            Self::GenerationRetry { .. } => "generation.retry",
            Self::FallbackUsed { .. } => "generation.fallback_used",
            Self::EchoDetected { .. } => "echo.detected",
            Self::FactsMerged { .. } => "facts.merged",
            Self::FactsSkipped { .. } => "facts.skipped",
            Self::TurnDegraded { .. } => "turn.degraded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_dotted() {
        let event = EngineEvent::CredentialFailure {
            id: CredentialId::new("key_1"),
            kind: FailureKind::Timeout,
        };
        assert_eq!(event.name(), "credential.failure");

        let event = EngineEvent::FallbackUsed {
            reason: "pool_exhausted".to_string(),
        };
        assert_eq!(event.name(), "generation.fallback_used");
    }
}
