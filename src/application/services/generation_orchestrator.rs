//! Generation Orchestrator - reliable structured generation over an unreliable provider
//!
//! Always returns a valid `GenerationResult`. Provider instability, malformed
//! payloads and leaked instructions are absorbed by rotating credentials,
//! one echo retry, and finally the local fallback.
//!
//! Termination: a transport/schema failure budget of
//! `min(max_attempts, pool size)` plus at most two filter failures, where
//! any continuing state holds fewer than `budget` failures of the first kind
//! and fewer than two of the second. That caps total provider calls at
//! `budget + 1`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::application::dto::{
    FallbackReason, GenerationRequest, GenerationResult, GenerationSource,
};
use crate::application::ports::outbound::{
    ClockPort, CredentialLease, CredentialPoolPort, EventSink, ProviderError, ProviderRequest,
    StructuredGenerationPort, TextClassifier,
};
use crate::application::services::fallback::fallback_result;
use crate::domain::events::EngineEvent;
use crate::domain::value_objects::{Fact, FailureKind};

/// Echo-flagged outputs tolerated before giving up
const MAX_FILTER_FAILURES: u32 = 2;

/// Wire shape of the story-turn payload, accepting legacy field names
#[derive(Debug, Deserialize)]
struct StoryPayload {
    #[serde(alias = "ai_text")]
    narrative: String,
    options: Vec<String>,
    #[serde(alias = "extracted_facts")]
    facts: Vec<Fact>,
}

/// Why a parsed payload was rejected by the output filter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum Rejection {
    #[error("narrative flagged as system echo")]
    Echo,
    #[error("expected 2-3 options, got {0}")]
    OptionCount(usize),
    #[error("option {0} is empty")]
    EmptyOption(usize),
    #[error("fact {index} is malformed: {detail}")]
    MalformedFact { index: usize, detail: String },
}

pub struct GenerationOrchestrator {
    pool: Arc<dyn CredentialPoolPort>,
    provider: Arc<dyn StructuredGenerationPort>,
    filter: Arc<dyn TextClassifier>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn ClockPort>,
    echo_retry_delay: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        pool: Arc<dyn CredentialPoolPort>,
        provider: Arc<dyn StructuredGenerationPort>,
        filter: Arc<dyn TextClassifier>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            pool,
            provider,
            filter,
            events,
            clock,
            echo_retry_delay: Duration::from_millis(500),
        }
    }

    /// Pause before the echo-triggered retry
    pub fn with_echo_retry_delay(mut self, delay: Duration) -> Self {
        self.echo_retry_delay = delay;
        self
    }

    /// Produce a story continuation for `request`; never fails
    #[instrument(skip(self, request), fields(max_attempts = request.max_attempts))]
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let pool_size = self.pool.size().max(1) as u32;
        let provider_budget = request.max_attempts.max(1).min(pool_size);
        let provider_request = ProviderRequest {
            system_prompt: request.system_prompt.clone(),
            user_prompt: request.user_prompt.clone(),
            schema: request.schema.clone(),
        };

        let mut attempts = 0u32;
        let mut provider_failures = 0u32;
        let mut filter_failures = 0u32;
        let mut failure_log: Vec<FailureKind> = Vec::new();

        loop {
            let lease = match self.pool.select_credential(self.clock.now()).await {
                Ok(lease) => lease,
                Err(e) => {
                    debug!(error = %e, failures = ?failure_log, "No credential available");
                    let reason = if failure_log.is_empty() {
                        FallbackReason::PoolExhausted
                    } else if filter_failures > 0 && provider_failures == 0 {
                        FallbackReason::EchoRepeated
                    } else {
                        FallbackReason::ProviderFailures
                    };
                    return self.fallback(request, reason, attempts);
                }
            };

            attempts += 1;
            self.events.emit(EngineEvent::GenerationAttempt {
                attempt: attempts,
                credential: lease.id.clone(),
            });

            let payload = self.call_provider(&lease, &provider_request, request.timeout).await;

            let kind = match payload {
                Err(error) => {
                    let kind = error.failure_kind();
                    warn!(
                        credential = %lease.id,
                        attempt = attempts,
                        error = %error,
                        "Provider attempt failed"
                    );
                    self.report_failure(&lease, kind).await;
                    provider_failures += 1;
                    if provider_failures >= provider_budget {
                        return self.fallback(request, FallbackReason::ProviderFailures, attempts);
                    }
                    kind
                }
                Ok(payload) => match self.screen(payload) {
                    Ok((narrative, options, facts)) => {
                        self.pool.record_success(&lease.id, self.clock.now()).await;
                        info!(
                            credential = %lease.id,
                            attempts,
                            facts = facts.len(),
                            "Generation succeeded"
                        );
                        return GenerationResult {
                            narrative,
                            options,
                            facts,
                            source: GenerationSource::Provider {
                                credential: lease.id,
                            },
                            attempts,
                        };
                    }
                    Err(rejection) => {
                        warn!(
                            credential = %lease.id,
                            attempt = attempts,
                            reason = %rejection,
                            "Provider output rejected"
                        );
                        if rejection == Rejection::Echo {
                            self.events.emit(EngineEvent::EchoDetected {
                                credential: lease.id.clone(),
                            });
                        }
                        self.report_failure(&lease, FailureKind::Echo).await;
                        filter_failures += 1;
                        if filter_failures >= MAX_FILTER_FAILURES {
                            return self.fallback(request, FallbackReason::EchoRepeated, attempts);
                        }
                        tokio::time::sleep(self.echo_retry_delay).await;
                        FailureKind::Echo
                    }
                },
            };

            failure_log.push(kind);
            self.events.emit(EngineEvent::GenerationRetry {
                attempt: attempts + 1,
                reason: kind,
            });
        }
    }

    /// One provider call under the per-call timeout, parsed into the payload shape
    async fn call_provider(
        &self,
        lease: &CredentialLease,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<StoryPayload, ProviderError> {
        let value = tokio::time::timeout(
            timeout,
            self.provider.generate_structured(&lease.secret, request),
        )
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;

        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Apply the echo filter and the output invariants
    fn screen(&self, payload: StoryPayload) -> Result<(String, Vec<String>, Vec<Fact>), Rejection> {
        let narrative = payload.narrative.trim().to_string();
        if self.filter.is_flagged(&narrative) {
            return Err(Rejection::Echo);
        }

        if !(2..=3).contains(&payload.options.len()) {
            return Err(Rejection::OptionCount(payload.options.len()));
        }
        let mut options = Vec::with_capacity(payload.options.len());
        for (index, option) in payload.options.iter().enumerate() {
            let option = option.trim();
            if option.is_empty() {
                return Err(Rejection::EmptyOption(index));
            }
            options.push(option.to_string());
        }

        for (index, fact) in payload.facts.iter().enumerate() {
            fact.validate().map_err(|e| Rejection::MalformedFact {
                index,
                detail: e.to_string(),
            })?;
        }

        Ok((narrative, options, payload.facts))
    }

    async fn report_failure(&self, lease: &CredentialLease, kind: FailureKind) {
        self.events.emit(EngineEvent::CredentialFailure {
            id: lease.id.clone(),
            kind,
        });
        if let Some(opened) = self
            .pool
            .record_failure(&lease.id, kind, self.clock.now())
            .await
        {
            self.events.emit(EngineEvent::CredentialOpened {
                id: lease.id.clone(),
                cooldown: opened.cooldown,
                until: opened.until,
            });
        }
    }

    fn fallback(
        &self,
        request: &GenerationRequest,
        reason: FallbackReason,
        attempts: u32,
    ) -> GenerationResult {
        warn!(reason = %reason, attempts, "Using local fallback content");
        self.events.emit(EngineEvent::FallbackUsed {
            reason: reason.to_string(),
        });
        fallback_result(request.fallback_seed, reason, attempts)
    }
}
