//! Outbound ports - Interfaces that the application requires from external systems

mod credential_pool_port;
mod generation_port;
mod memory_port;
mod observability_port;
mod session_store_port;
mod text_classifier_port;

pub use credential_pool_port::{CredentialLease, CredentialPoolPort, OpenedCircuit, PoolError};
pub use generation_port::{ProviderError, ProviderRequest, StructuredGenerationPort};
pub use memory_port::{
    GraphEdge, GraphStoreError, GraphStorePort, VectorFragment, VectorHit, VectorStoreError,
    VectorStorePort,
};
pub use observability_port::{ClockPort, EventSink};
pub use session_store_port::{PersistenceError, SessionStorePort};
pub use text_classifier_port::TextClassifier;
