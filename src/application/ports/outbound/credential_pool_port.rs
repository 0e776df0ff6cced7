//! Credential pool port - selection and health reporting for provider credentials

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{ApiKey, CredentialSnapshot};
use crate::domain::value_objects::{CredentialId, FailureKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("No usable credential: all circuits are open")]
    PoolExhausted,
}

/// A credential handed out for one generation attempt
#[derive(Debug, Clone)]
pub struct CredentialLease {
    pub id: CredentialId,
    pub secret: ApiKey,
    /// This attempt is the half-open trial for the credential
    pub trial: bool,
}

/// Reported when a failure opened a credential's circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedCircuit {
    pub cooldown: Duration,
    pub until: DateTime<Utc>,
}

/// The only shared resource across sessions
///
/// Implementations serialize every state transition on a record and never
/// hold their lock across a provider call; callers select, release the
/// pool, call the provider, then report back.
#[async_trait]
pub trait CredentialPoolPort: Send + Sync {
    /// Pick the least-used `Closed` or `HalfOpen` credential
    ///
    /// A `HalfOpen` lease holds the trial until it is reported or the
    /// policy's trial timeout passes, whichever comes first.
    async fn select_credential(&self, now: DateTime<Utc>) -> Result<CredentialLease, PoolError>;

    /// Close the circuit and clear its failure history
    async fn record_success(&self, id: &CredentialId, now: DateTime<Utc>);

    /// Count a failure; returns the new cooldown if this opened the circuit
    async fn record_failure(
        &self,
        id: &CredentialId,
        kind: FailureKind,
        now: DateTime<Utc>,
    ) -> Option<OpenedCircuit>;

    async fn snapshot(&self) -> Vec<CredentialSnapshot>;

    /// Number of credentials in the pool
    fn size(&self) -> usize;
}
