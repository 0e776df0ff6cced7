//! Memory ports - vector similarity search and the fact graph
//!
//! Both stores are scoped per session. The retrieval fuser only reads from
//! them; the turn controller writes after a turn has been saved.

use async_trait::async_trait;

use crate::domain::value_objects::{Fact, SessionId};

// =============================================================================
// Vector Store Port
// =============================================================================

/// A narrative fragment to index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFragment {
    pub session_id: SessionId,
    pub turn: u64,
    pub text: String,
}

/// A similarity search hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub text: String,
    /// Higher is more similar
    pub score: f64,
    pub turn: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid vector store response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait VectorStorePort: Send + Sync {
    /// Top `k` fragments most similar to `text`, best first
    async fn query(
        &self,
        session_id: SessionId,
        text: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    async fn upsert(&self, fragment: VectorFragment) -> Result<(), VectorStoreError>;
}

// =============================================================================
// Graph Store Port
// =============================================================================

/// A fact stored in the graph with the turn that last asserted it
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub fact: Fact,
    pub turn: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),
    #[error("Graph query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait GraphStorePort: Send + Sync {
    /// Upsert a fact; repeating a triple keeps the max certainty
    async fn apply(
        &self,
        session_id: SessionId,
        fact: &Fact,
        turn: u64,
    ) -> Result<(), GraphStoreError>;

    /// Facts whose subject or object is `entity`
    async fn query(
        &self,
        session_id: SessionId,
        entity: &str,
    ) -> Result<Vec<GraphEdge>, GraphStoreError>;
}
