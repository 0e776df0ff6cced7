use async_trait::async_trait;

use crate::domain::entities::Session;
use crate::domain::value_objects::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for sessions
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, PersistenceError>;
    async fn save(&self, session: &Session) -> Result<(), PersistenceError>;
}
