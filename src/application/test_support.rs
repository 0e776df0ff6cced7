//! Test doubles for the outbound ports

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::application::ports::outbound::{
    ClockPort, EventSink, GraphEdge, GraphStoreError, GraphStorePort, PersistenceError,
    ProviderError, ProviderRequest, SessionStorePort, StructuredGenerationPort, VectorFragment,
    VectorHit, VectorStoreError, VectorStorePort,
};
use crate::application::services::InMemoryCredentialPool;
use crate::domain::entities::{ApiKey, CredentialRecord, Session};
use crate::domain::events::EngineEvent;
use crate::domain::services::BreakerPolicy;
use crate::domain::value_objects::{Fact, SessionId};

// =============================================================================
// Provider
// =============================================================================

/// One scripted provider reply
pub enum Step {
    Reply(serde_json::Value),
    Fail(ProviderError),
    /// Sleep before replying, to trip timeouts
    Stall(Duration, serde_json::Value),
}

/// Replays a fixed script; an exhausted script fails with a transport error
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Secrets used, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredGenerationPort for ScriptedProvider {
    async fn generate_structured(
        &self,
        credential: &ApiKey,
        _request: &ProviderRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        self.calls.lock().unwrap().push(credential.expose().to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(value)) => Ok(value),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stall(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Err(ProviderError::Transport("script exhausted".to_string())),
        }
    }
}

pub fn story(narrative: &str, options: &[&str]) -> serde_json::Value {
    json!({ "narrative": narrative, "options": options, "facts": [] })
}

pub fn story_with_facts(narrative: &str, options: &[&str], facts: &[Fact]) -> serde_json::Value {
    json!({ "narrative": narrative, "options": options, "facts": facts })
}

/// Pool of `n` credentials named `key_1..key_n` with secrets `secret-1..secret-n`
pub fn pool_of(n: usize, policy: BreakerPolicy) -> InMemoryCredentialPool {
    let records = (1..=n)
        .map(|i| CredentialRecord::new(format!("key_{i}"), ApiKey::new(format!("secret-{i}"))))
        .collect();
    InMemoryCredentialPool::new(records, policy)
}

// =============================================================================
// Observability
// =============================================================================

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(EngineEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Vector store that is always down
pub struct FailingVectorStore;

#[async_trait]
impl VectorStorePort for FailingVectorStore {
    async fn query(
        &self,
        _: SessionId,
        _: &str,
        _: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        Err(VectorStoreError::Unavailable("connection refused".to_string()))
    }

    async fn upsert(&self, _: VectorFragment) -> Result<(), VectorStoreError> {
        Err(VectorStoreError::Unavailable("connection refused".to_string()))
    }
}

/// Graph store that is always down
pub struct FailingGraphStore;

#[async_trait]
impl GraphStorePort for FailingGraphStore {
    async fn apply(&self, _: SessionId, _: &Fact, _: u64) -> Result<(), GraphStoreError> {
        Err(GraphStoreError::Unavailable("connection refused".to_string()))
    }

    async fn query(&self, _: SessionId, _: &str) -> Result<Vec<GraphEdge>, GraphStoreError> {
        Err(GraphStoreError::Unavailable("connection refused".to_string()))
    }
}

/// Graph store that never answers
pub struct HangingGraphStore;

#[async_trait]
impl GraphStorePort for HangingGraphStore {
    async fn apply(&self, _: SessionId, _: &Fact, _: u64) -> Result<(), GraphStoreError> {
        std::future::pending().await
    }

    async fn query(&self, _: SessionId, _: &str) -> Result<Vec<GraphEdge>, GraphStoreError> {
        std::future::pending().await
    }
}

/// Loads nothing and refuses every save
pub struct FailingSessionStore;

#[async_trait]
impl SessionStorePort for FailingSessionStore {
    async fn load(&self, _: SessionId) -> Result<Option<Session>, PersistenceError> {
        Ok(None)
    }

    async fn save(&self, _: &Session) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("disk full".to_string()))
    }
}

/// Vector store returning fixed hits for every query
pub struct StaticVectorStore {
    hits: Vec<VectorHit>,
    upserts: Mutex<Vec<VectorFragment>>,
}

impl StaticVectorStore {
    pub fn new(hits: Vec<VectorHit>) -> Self {
        Self {
            hits,
            upserts: Mutex::new(Vec::new()),
        }
    }

    pub fn upserts(&self) -> Vec<VectorFragment> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStorePort for StaticVectorStore {
    async fn query(
        &self,
        _: SessionId,
        _: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    async fn upsert(&self, fragment: VectorFragment) -> Result<(), VectorStoreError> {
        self.upserts.lock().unwrap().push(fragment);
        Ok(())
    }
}

/// Graph store answering from a fixed edge list
pub struct StaticGraphStore {
    edges: Vec<GraphEdge>,
    unreachable: Vec<String>,
    applied: Mutex<Vec<Fact>>,
}

impl StaticGraphStore {
    pub fn new(edges: Vec<GraphEdge>) -> Self {
        Self {
            edges,
            unreachable: Vec::new(),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Lookups for `entity` fail as if its shard were down
    pub fn with_unreachable_entity(mut self, entity: &str) -> Self {
        self.unreachable.push(entity.to_string());
        self
    }

    pub fn applied(&self) -> Vec<Fact> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStorePort for StaticGraphStore {
    async fn apply(&self, _: SessionId, fact: &Fact, _: u64) -> Result<(), GraphStoreError> {
        self.applied.lock().unwrap().push(fact.clone());
        Ok(())
    }

    async fn query(&self, _: SessionId, entity: &str) -> Result<Vec<GraphEdge>, GraphStoreError> {
        if self.unreachable.iter().any(|name| name == entity) {
            return Err(GraphStoreError::Unavailable(format!("no route to {entity}")));
        }
        Ok(self
            .edges
            .iter()
            .filter(|edge| edge.fact.subject == entity || edge.fact.object == entity)
            .cloned()
            .collect())
    }
}

/// Session store backed by a map, counting saves
#[derive(Default)]
pub struct RecordingSessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    saves: Mutex<usize>,
}

impl RecordingSessionStore {
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.lock().unwrap().get(&id).cloned()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl SessionStorePort for RecordingSessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, PersistenceError> {
        Ok(self.get(id))
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        *self.saves.lock().unwrap() += 1;
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }
}
