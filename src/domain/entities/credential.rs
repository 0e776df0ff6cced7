//! Credential entity - one provider API key and its breaker bookkeeping

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::{BreakerState, CircuitState, CredentialId};

/// Raw secret handle; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret itself, for placing in an Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// A provider credential owned by the credential pool
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub secret: ApiKey,
    pub breaker: BreakerState,
    /// Lifetime number of times this credential was handed out
    pub usage_count: u64,
}

impl CredentialRecord {
    pub fn new(id: impl Into<String>, secret: ApiKey) -> Self {
        Self {
            id: CredentialId::new(id),
            secret,
            breaker: BreakerState::default(),
            usage_count: 0,
        }
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            id: self.id.clone(),
            state: self.breaker.circuit,
            consecutive_failures: self.breaker.consecutive_failures,
            times_opened: self.breaker.times_opened,
            usage_count: self.usage_count,
            cooldown_until: self.breaker.cooldown_until,
        }
    }
}

/// Read-only view of a credential's health, safe to expose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialSnapshot {
    pub id: CredentialId,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub times_opened: u32,
    pub usage_count: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
}
