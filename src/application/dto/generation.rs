use std::time::Duration;

use serde::Serialize;

use crate::domain::value_objects::{CredentialId, Fact};

/// A request to the generation orchestrator
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Output schema the provider must fill
    pub schema: serde_json::Value,
    /// Cap on provider attempts, further bounded by the pool size
    pub max_attempts: u32,
    /// Per-call timeout
    pub timeout: Duration,
    /// Picks the fallback narrative deterministically
    pub fallback_seed: u64,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            schema: serde_json::Value::Null,
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            fallback_seed: 0,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback_seed(mut self, seed: u64) -> Self {
        self.fallback_seed = seed;
        self
    }
}

/// Why local fallback content was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No credential was selectable
    PoolExhausted,
    /// Provider attempts ran out on transport, timeout or schema failures
    ProviderFailures,
    /// The echo retry was also flagged
    EchoRepeated,
    /// The turn deadline expired during generation
    TurnTimeout,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoolExhausted => "pool_exhausted",
            Self::ProviderFailures => "provider_failures",
            Self::EchoRepeated => "echo_repeated",
            Self::TurnTimeout => "turn_timeout",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationSource {
    Provider { credential: CredentialId },
    Fallback { reason: FallbackReason },
}

/// A validated story continuation
///
/// The narrative passed the echo filter, there are 2 or 3 options and
/// every fact is well formed, whether it came from a provider or from
/// the local fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub narrative: String,
    pub options: Vec<String>,
    pub facts: Vec<Fact>,
    pub source: GenerationSource,
    /// Provider calls made while producing this result
    pub attempts: u32,
}

impl GenerationResult {
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self.source {
            GenerationSource::Fallback { reason } => Some(reason),
            GenerationSource::Provider { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_reason().is_some()
    }
}
