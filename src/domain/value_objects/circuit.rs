//! Circuit breaker value objects
//!
//! The state carried per credential, the events that drive it, and the
//! failure taxonomy reported by the generation orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a credential's circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - credential usable
    #[default]
    Closed,
    /// Credential failing - unusable until its cooldown elapses
    Open,
    /// Cooldown elapsed - a single trial request is permitted
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Why a generation attempt counted against a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection or HTTP-level failure
    Transport,
    /// The call exceeded its per-call timeout
    Timeout,
    /// Provider rejected the call for quota or rate reasons
    RateLimited,
    /// Provider rejected the credential itself
    Auth,
    /// Provider answered with a non-success status
    Provider,
    /// The payload did not match the response schema
    Schema,
    /// The narrative leaked operator instructions or broke an output invariant
    Echo,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Auth => "auth",
            Self::Provider => "provider",
            Self::Schema => "schema",
            Self::Echo => "echo",
        }
    }

    /// Failures that open the circuit regardless of the consecutive count
    pub fn trips_immediately(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Auth)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker bookkeeping carried by each credential record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakerState {
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    /// How many times the circuit has opened since the last success
    pub times_opened: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Set while a half-open trial is out; a trial not reported by then
    /// counts as failed
    pub trial_expires_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    /// Whether a selection may hand this credential out right now
    ///
    /// Expects `Open -> HalfOpen` promotion to have been evaluated first.
    pub fn is_selectable(&self) -> bool {
        match self.circuit {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => self.trial_expires_at.is_none(),
            CircuitState::Open => false,
        }
    }
}

/// Inputs to the breaker transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    /// Selection-time check: promotes an expired `Open` to `HalfOpen` and
    /// reopens a `HalfOpen` whose trial was never reported
    Poll,
    /// A half-open credential was handed out for its trial
    TrialStarted,
    Success,
    Failure(FailureKind),
}
