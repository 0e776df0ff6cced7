//! Data Transfer Objects - values passed between services and across the API
//!
//! DTOs live in the application layer so infrastructure (HTTP) can
//! serialize them without pulling serde concerns into the domain rules.

mod context;
mod generation;
mod turn;

pub use context::{ContextBundle, ContextItem, ContextSource};
pub use generation::{FallbackReason, GenerationRequest, GenerationResult, GenerationSource};
pub use turn::{TurnOutcome, TurnPhase};
