//! Domain services - Pure rules over domain state

pub mod circuit_breaker;
pub mod world_state_merger;

pub use circuit_breaker::{transition, BreakerPolicy};
pub use world_state_merger::{MergeOutcome, WorldStateMerger};
