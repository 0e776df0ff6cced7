//! Domain events - Notifications of significant things that happened in the engine

mod engine_events;

pub use engine_events::EngineEvent;
