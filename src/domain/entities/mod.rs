//! Domain entities - Core business objects with identity

mod credential;
mod session;
mod world_state;

pub use credential::{ApiKey, CredentialRecord, CredentialSnapshot};
pub use session::{Actor, Session, TurnRecord};
pub use world_state::{LedgerEntry, RelationEdge, WorldState};
