//! Structured generation port - one schema-bound call to an LLM provider

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::ApiKey;
use crate::domain::value_objects::FailureKind;

/// A provider call with its required output schema
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the provider must fill
    pub schema: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Credential rejected: {0}")]
    Auth(String),
    #[error("Provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// How this error counts against the credential that produced it
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Auth(_) => FailureKind::Auth,
            Self::Api { .. } => FailureKind::Provider,
            Self::InvalidResponse(_) => FailureKind::Schema,
        }
    }
}

/// An LLM provider that can answer with a schema-shaped JSON object
#[async_trait]
pub trait StructuredGenerationPort: Send + Sync {
    /// Issue one call with `credential`, returning the raw structured arguments
    async fn generate_structured(
        &self,
        credential: &ApiKey,
        request: &ProviderRequest,
    ) -> Result<serde_json::Value, ProviderError>;
}
