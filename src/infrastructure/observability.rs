//! Event sink and clock backed by `tracing` and the system clock

use chrono::{DateTime, Utc};

use crate::application::ports::outbound::{ClockPort, EventSink};
use crate::domain::events::EngineEvent;

/// Writes engine events as structured log records under `taleforge::events`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EngineEvent) {
        let name = event.name();
        match event {
            EngineEvent::CredentialFailure { id, kind } => {
                tracing::warn!(
                    target: "taleforge::events",
                    event = name,
                    credential = %id,
                    kind = kind.as_str()
                );
            }
            EngineEvent::CredentialOpened { id, cooldown, until } => {
                tracing::warn!(
                    target: "taleforge::events",
                    event = name,
                    credential = %id,
                    cooldown_secs = cooldown.as_secs(),
                    until = %until
                );
            }
            EngineEvent::GenerationAttempt { attempt, credential } => {
                tracing::debug!(
                    target: "taleforge::events",
                    event = name,
                    attempt,
                    credential = %credential
                );
            }
            EngineEvent::GenerationRetry { attempt, reason } => {
                tracing::info!(
                    target: "taleforge::events",
                    event = name,
                    attempt,
                    reason = reason.as_str()
                );
            }
            EngineEvent::FallbackUsed { reason } => {
                tracing::warn!(target: "taleforge::events", event = name, reason = %reason);
            }
            EngineEvent::EchoDetected { credential } => {
                tracing::warn!(target: "taleforge::events", event = name, credential = %credential);
            }
            EngineEvent::FactsMerged { session_id, count } => {
                tracing::info!(
                    target: "taleforge::events",
                    event = name,
                    session_id = %session_id,
                    count
                );
            }
            EngineEvent::FactsSkipped {
                session_id,
                count,
                reason,
            } => {
                tracing::info!(
                    target: "taleforge::events",
                    event = name,
                    session_id = %session_id,
                    count,
                    reason = %reason
                );
            }
            EngineEvent::TurnDegraded { session_id, reason } => {
                tracing::warn!(
                    target: "taleforge::events",
                    event = name,
                    session_id = %session_id,
                    reason = %reason
                );
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
