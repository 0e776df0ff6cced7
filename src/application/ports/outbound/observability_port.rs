//! Observability and time ports

use chrono::{DateTime, Utc};

use crate::domain::events::EngineEvent;

/// Receives structured engine events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Source of the current time, so breaker cooldowns can be tested
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
