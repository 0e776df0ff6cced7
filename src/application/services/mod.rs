//! Application services - Story-turn orchestration
//!
//! Each service depends on outbound ports only, so every provider and store
//! can be swapped for a test double or another backend.

pub mod credential_pool;
pub mod fact_extractor;
pub mod fallback;
pub mod generation_orchestrator;
pub mod input_filter;
pub mod llm;
pub mod retrieval_fuser;
pub mod system_echo_filter;
pub mod turn_controller;

pub use credential_pool::InMemoryCredentialPool;
pub use generation_orchestrator::GenerationOrchestrator;
pub use input_filter::BannedTermInputFilter;
pub use retrieval_fuser::{RetrievalFuser, RetrievalSettings};
pub use system_echo_filter::PhraseEchoFilter;
pub use turn_controller::{TurnController, TurnSettings};
