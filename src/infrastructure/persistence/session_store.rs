//! Session store adapters
//!
//! Sessions are persisted whole, as a JSON document per session id.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::application::ports::outbound::{PersistenceError, SessionStorePort};
use crate::domain::entities::Session;
use crate::domain::value_objects::SessionId;

/// Process-local store; sessions are lost on restart
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, PersistenceError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        self.sessions.write().await.insert(session.id, session.clone());
        Ok(())
    }
}

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::new(pool).await
    }

    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                turn_counter INTEGER NOT NULL,
                data TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStorePort for SqliteSessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, PersistenceError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        row.map(|(data,)| {
            serde_json::from_str(&data).map_err(|e| PersistenceError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        let data = serde_json::to_string(session)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT OR REPLACE INTO sessions (id, turn_counter, data, updated_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(session.id.to_string())
        .bind(session.turn_counter as i64)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Database(e.to_string()))?;
        Ok(())
    }
}
