//! Value objects - Immutable objects defined by their attributes

mod circuit;
mod fact;
mod ids;

pub use circuit::{BreakerEvent, BreakerState, CircuitState, FailureKind};
pub use fact::{Fact, FactKey, FactKind};
pub use ids::*;
