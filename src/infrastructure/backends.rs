//! Backend selection - builds store adapters from configuration
//!
//! Each enum wraps the adapters available for one port so the concrete
//! backend can be chosen at startup while callers keep a single type.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::application::ports::outbound::{
    GraphEdge, GraphStoreError, GraphStorePort, PersistenceError, SessionStorePort, VectorFragment,
    VectorHit, VectorStoreError, VectorStorePort,
};
use crate::domain::entities::Session;
use crate::domain::value_objects::{Fact, SessionId};
use crate::infrastructure::config::{
    GraphBackendKind, GraphConfig, SessionStoreConfig, SessionStoreKind, VectorBackendKind,
    VectorConfig,
};
use crate::infrastructure::memory::{
    HttpVectorStore, InMemoryGraphStore, InMemoryVectorStore, Neo4jGraphStore,
};
use crate::infrastructure::persistence::{InMemorySessionStore, SqliteSessionStore};

// =============================================================================
// Vector
// =============================================================================

pub enum VectorBackend {
    Memory(InMemoryVectorStore),
    External(HttpVectorStore),
}

impl VectorBackend {
    pub fn from_config(config: &VectorConfig) -> Result<Self> {
        match config.backend {
            VectorBackendKind::Memory => Ok(Self::Memory(InMemoryVectorStore::new())),
            VectorBackendKind::External => {
                let url = config
                    .url
                    .as_deref()
                    .context("vector.url is required for the external vector backend")?;
                Ok(Self::External(HttpVectorStore::new(url)))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::External(_) => "external",
        }
    }
}

#[async_trait]
impl VectorStorePort for VectorBackend {
    async fn query(
        &self,
        session_id: SessionId,
        text: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        match self {
            Self::Memory(s) => s.query(session_id, text, k).await,
            Self::External(s) => s.query(session_id, text, k).await,
        }
    }

    async fn upsert(&self, fragment: VectorFragment) -> Result<(), VectorStoreError> {
        match self {
            Self::Memory(s) => s.upsert(fragment).await,
            Self::External(s) => s.upsert(fragment).await,
        }
    }
}

// =============================================================================
// Graph
// =============================================================================

pub enum GraphBackend {
    Memory(InMemoryGraphStore),
    Neo4j(Neo4jGraphStore),
}

impl GraphBackend {
    pub async fn from_config(config: &GraphConfig) -> Result<Self> {
        match config.backend {
            GraphBackendKind::Memory => Ok(Self::Memory(InMemoryGraphStore::new())),
            GraphBackendKind::Neo4j => {
                let password = config
                    .neo4j_password
                    .as_deref()
                    .context("graph.neo4j_password is required for the neo4j backend")?;
                let store = Neo4jGraphStore::connect(
                    &config.neo4j_uri,
                    &config.neo4j_user,
                    password,
                    &config.neo4j_database,
                )
                .await?;
                Ok(Self::Neo4j(store))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Neo4j(_) => "neo4j",
        }
    }
}

#[async_trait]
impl GraphStorePort for GraphBackend {
    async fn apply(
        &self,
        session_id: SessionId,
        fact: &Fact,
        turn: u64,
    ) -> Result<(), GraphStoreError> {
        match self {
            Self::Memory(s) => s.apply(session_id, fact, turn).await,
            Self::Neo4j(s) => s.apply(session_id, fact, turn).await,
        }
    }

    async fn query(
        &self,
        session_id: SessionId,
        entity: &str,
    ) -> Result<Vec<GraphEdge>, GraphStoreError> {
        match self {
            Self::Memory(s) => s.query(session_id, entity).await,
            Self::Neo4j(s) => s.query(session_id, entity).await,
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

pub enum SessionStoreBackend {
    Memory(InMemorySessionStore),
    Sqlite(SqliteSessionStore),
}

impl SessionStoreBackend {
    pub async fn from_config(config: &SessionStoreConfig) -> Result<Self> {
        match config.backend {
            SessionStoreKind::Memory => Ok(Self::Memory(InMemorySessionStore::new())),
            SessionStoreKind::Sqlite => {
                let store = SqliteSessionStore::open(&config.sqlite_path)
                    .await
                    .with_context(|| {
                        format!("Failed to open session database {}", config.sqlite_path)
                    })?;
                Ok(Self::Sqlite(store))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

#[async_trait]
impl SessionStorePort for SessionStoreBackend {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, PersistenceError> {
        match self {
            Self::Memory(s) => s.load(id).await,
            Self::Sqlite(s) => s.load(id).await,
        }
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        match self {
            Self::Memory(s) => s.save(session).await,
            Self::Sqlite(s) => s.save(session).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_vector_backend_requires_url() {
        let config = VectorConfig {
            backend: VectorBackendKind::External,
            url: None,
        };
        assert!(VectorBackend::from_config(&config).is_err());

        let config = VectorConfig {
            backend: VectorBackendKind::External,
            url: Some("http://localhost:8000".to_string()),
        };
        assert_eq!(VectorBackend::from_config(&config).unwrap().name(), "external");
    }

    #[tokio::test]
    async fn test_neo4j_backend_requires_password() {
        let config = GraphConfig {
            backend: GraphBackendKind::Neo4j,
            ..GraphConfig::default()
        };
        assert!(GraphBackend::from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_defaults_are_in_memory() {
        let graph = GraphBackend::from_config(&GraphConfig::default()).await.unwrap();
        let sessions = SessionStoreBackend::from_config(&SessionStoreConfig::default())
            .await
            .unwrap();
        assert_eq!(graph.name(), "memory");
        assert_eq!(sessions.name(), "memory");
    }
}
