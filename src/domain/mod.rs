//! Domain layer - Core story model with no external dependencies
//!
//! This layer contains:
//! - Entities: credential records, world state, sessions
//! - Value Objects: identifiers, facts, circuit states
//! - Domain Events: observability events emitted by the engine
//! - Domain Services: pure breaker transitions and world-state merging

pub mod entities;
pub mod events;
pub mod services;
pub mod value_objects;
