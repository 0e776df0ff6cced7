//! Vector store adapters
//!
//! `InMemoryVectorStore` scores fragments by token overlap, which is enough
//! for single-process play and tests. `HttpVectorStore` talks to an external
//! embedding service exposing `/query` and `/upsert`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::application::ports::outbound::{
    VectorFragment, VectorHit, VectorStoreError, VectorStorePort,
};
use crate::domain::value_objects::SessionId;

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct InMemoryVectorStore {
    fragments: RwLock<HashMap<SessionId, Vec<VectorFragment>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard overlap of the two token sets
fn similarity(query: &HashSet<String>, text: &str) -> f64 {
    let candidate = tokens(text);
    let union = query.union(&candidate).count();
    if union == 0 {
        return 0.0;
    }
    query.intersection(&candidate).count() as f64 / union as f64
}

#[async_trait]
impl VectorStorePort for InMemoryVectorStore {
    async fn query(
        &self,
        session_id: SessionId,
        text: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let query = tokens(text);
        let fragments = self.fragments.read().await;
        let Some(session) = fragments.get(&session_id) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = session
            .iter()
            .map(|fragment| VectorHit {
                text: fragment.text.clone(),
                score: similarity(&query, &fragment.text),
                turn: fragment.turn,
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(b.turn.cmp(&a.turn)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn upsert(&self, fragment: VectorFragment) -> Result<(), VectorStoreError> {
        let mut fragments = self.fragments.write().await;
        let session = fragments.entry(fragment.session_id).or_default();
        match session.iter_mut().find(|f| f.turn == fragment.turn) {
            Some(existing) => *existing = fragment,
            None => session.push(fragment),
        }
        Ok(())
    }
}

// =============================================================================
// External service
// =============================================================================

/// Client for an external vector service
pub struct HttpVectorStore {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    session_id: String,
    text: &'a str,
    k: usize,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    session_id: String,
    turn: u64,
    text: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    hits: Vec<HitBody>,
}

#[derive(Deserialize)]
struct HitBody {
    text: String,
    score: f64,
    #[serde(default)]
    turn: u64,
}

impl HttpVectorStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorStorePort for HttpVectorStore {
    async fn query(
        &self,
        session_id: SessionId,
        text: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&QueryBody {
                session_id: session_id.to_string(),
                text,
                k,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?;

        Ok(body
            .hits
            .into_iter()
            .take(k)
            .map(|hit| VectorHit {
                text: hit.text,
                score: hit.score,
                turn: hit.turn,
            })
            .collect())
    }

    async fn upsert(&self, fragment: VectorFragment) -> Result<(), VectorStoreError> {
        self.client
            .post(format!("{}/upsert", self.base_url))
            .json(&UpsertBody {
                session_id: fragment.session_id.to_string(),
                turn: fragment.turn,
                text: &fragment.text,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
