//! Credential Pool - in-memory credential rotation with per-credential circuit breakers
//!
//! The pool is small (a handful of keys), so every operation takes a single
//! pool-wide lock. The lock is only held for select/record bookkeeping and
//! never across a provider call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::ports::outbound::{
    CredentialLease, CredentialPoolPort, OpenedCircuit, PoolError,
};
use crate::domain::entities::{CredentialRecord, CredentialSnapshot};
use crate::domain::services::{transition, BreakerPolicy};
use crate::domain::value_objects::{BreakerEvent, CircuitState, CredentialId, FailureKind};

pub struct InMemoryCredentialPool {
    records: Mutex<Vec<CredentialRecord>>,
    policy: BreakerPolicy,
    size: usize,
}

impl InMemoryCredentialPool {
    pub fn new(records: Vec<CredentialRecord>, policy: BreakerPolicy) -> Self {
        let size = records.len();
        info!(credentials = size, "Credential pool initialised");
        Self {
            records: Mutex::new(records),
            policy,
            size,
        }
    }
}

#[async_trait]
impl CredentialPoolPort for InMemoryCredentialPool {
    async fn select_credential(&self, now: DateTime<Utc>) -> Result<CredentialLease, PoolError> {
        let mut records = self.records.lock().await;

        for record in records.iter_mut() {
            let step = transition(record.breaker, BreakerEvent::Poll, now, &self.policy);
            if let Some(cooldown) = step.opened_for {
                warn!(
                    credential = %record.id,
                    cooldown_secs = cooldown.as_secs(),
                    times_opened = step.next.times_opened,
                    "Half-open trial abandoned, circuit reopened"
                );
            } else if step.next.circuit != record.breaker.circuit {
                debug!(credential = %record.id, "Cooldown elapsed, circuit half-open");
            }
            record.breaker = step.next;
        }

        // First minimum wins ties, so equal usage rotates in pool order
        let chosen = records
            .iter_mut()
            .filter(|record| record.breaker.is_selectable())
            .reduce(|best, candidate| {
                if candidate.usage_count < best.usage_count {
                    candidate
                } else {
                    best
                }
            })
            .ok_or(PoolError::PoolExhausted)?;

        let trial = chosen.breaker.circuit == CircuitState::HalfOpen;
        if trial {
            chosen.breaker =
                transition(chosen.breaker, BreakerEvent::TrialStarted, now, &self.policy).next;
        }
        chosen.usage_count += 1;

        Ok(CredentialLease {
            id: chosen.id.clone(),
            secret: chosen.secret.clone(),
            trial,
        })
    }

    async fn record_success(&self, id: &CredentialId, now: DateTime<Utc>) {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|record| &record.id == id) else {
            warn!(credential = %id, "Success reported for unknown credential");
            return;
        };
        if record.breaker.circuit != CircuitState::Closed {
            info!(credential = %id, "Circuit closed after successful trial");
        }
        record.breaker = transition(record.breaker, BreakerEvent::Success, now, &self.policy).next;
    }

    async fn record_failure(
        &self,
        id: &CredentialId,
        kind: FailureKind,
        now: DateTime<Utc>,
    ) -> Option<OpenedCircuit> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|record| &record.id == id) else {
            warn!(credential = %id, "Failure reported for unknown credential");
            return None;
        };

        let step = transition(record.breaker, BreakerEvent::Failure(kind), now, &self.policy);
        record.breaker = step.next;

        let opened = step.opened_for.zip(record.breaker.cooldown_until);
        match opened {
            Some((cooldown, until)) => {
                warn!(
                    credential = %id,
                    kind = %kind,
                    cooldown_secs = cooldown.as_secs(),
                    times_opened = record.breaker.times_opened,
                    "Circuit opened"
                );
                Some(OpenedCircuit { cooldown, until })
            }
            None => {
                debug!(
                    credential = %id,
                    kind = %kind,
                    consecutive_failures = record.breaker.consecutive_failures,
                    "Credential failure recorded"
                );
                None
            }
        }
    }

    async fn snapshot(&self) -> Vec<CredentialSnapshot> {
        self.records
            .lock()
            .await
            .iter()
            .map(CredentialRecord::snapshot)
            .collect()
    }

    fn size(&self) -> usize {
        self.size
    }
}
