//! Turn Controller - sequences one story turn end to end
//!
//! Start -> Retrieving -> Generating -> Validating -> Merging -> Persisted.
//! Any step may divert to fallback content (`Degraded`) but the turn still
//! completes and is saved. The only error that escapes is a
//! `PersistenceError`, since a computed turn that was not saved must not be
//! reported as success.
//!
//! Turns on one session are serialized by a per-session lock; turns on
//! different sessions share nothing but the credential pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::application::dto::{
    FallbackReason, GenerationRequest, GenerationResult, TurnOutcome, TurnPhase,
};
use crate::application::ports::outbound::{
    EventSink, GraphStorePort, PersistenceError, SessionStorePort, VectorFragment,
    VectorStorePort,
};
use crate::application::services::fact_extractor::extract_facts;
use crate::application::services::fallback::fallback_result;
use crate::application::services::llm::{build_system_prompt, build_user_prompt, story_turn_schema};
use crate::application::services::{GenerationOrchestrator, RetrievalFuser};
use crate::domain::entities::Session;
use crate::domain::events::EngineEvent;
use crate::domain::services::{MergeOutcome, WorldStateMerger};
use crate::domain::value_objects::{Fact, SessionId};

#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    pub max_provider_attempts: u32,
    pub provider_timeout: Duration,
    /// Deadline for the generation step of a whole turn
    pub turn_timeout: Duration,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_provider_attempts: 3,
            provider_timeout: Duration::from_secs(30),
            turn_timeout: Duration::from_secs(60),
        }
    }
}

pub struct TurnController {
    sessions: Arc<dyn SessionStorePort>,
    vector: Arc<dyn VectorStorePort>,
    graph: Arc<dyn GraphStorePort>,
    events: Arc<dyn EventSink>,
    fuser: RetrievalFuser,
    orchestrator: GenerationOrchestrator,
    merger: WorldStateMerger,
    settings: TurnSettings,
    session_locks: SessionLocks,
}

type SessionLocks = StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>;

/// A handle on one session's turn lock
///
/// The map entry lives only while some turn holds a handle; the last handle
/// to drop removes it, including when the turn future is cancelled.
struct SessionLockHandle<'a> {
    locks: &'a SessionLocks,
    session_id: SessionId,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> SessionLockHandle<'a> {
    fn acquire(locks: &'a SessionLocks, session_id: SessionId) -> Self {
        let lock = locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id)
            .or_default()
            .clone();
        Self {
            locks,
            session_id,
            lock: Some(lock),
        }
    }

    fn lock(&self) -> Arc<Mutex<()>> {
        self.lock.clone().unwrap_or_default()
    }
}

impl Drop for SessionLockHandle<'_> {
    fn drop(&mut self) {
        // Every other clone belongs to a live handle or to a guard taken
        // from one, so a count of one means no turn still needs the entry
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.lock.take());
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}

impl TurnController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStorePort>,
        vector: Arc<dyn VectorStorePort>,
        graph: Arc<dyn GraphStorePort>,
        events: Arc<dyn EventSink>,
        fuser: RetrievalFuser,
        orchestrator: GenerationOrchestrator,
        merger: WorldStateMerger,
        settings: TurnSettings,
    ) -> Self {
        Self {
            sessions,
            vector,
            graph,
            events,
            fuser,
            orchestrator,
            merger,
            settings,
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Load a session, creating and seeding it on first interaction
    pub async fn load_or_create(&self, session_id: SessionId) -> Result<Session, PersistenceError> {
        match self.sessions.load(session_id).await? {
            Some(session) => Ok(session),
            None => {
                info!(session_id = %session_id, "Starting new session");
                Ok(Session::new(session_id))
            }
        }
    }

    /// Play one turn for `player_action`
    #[instrument(skip(self, player_action), fields(session_id = %session_id))]
    pub async fn play_turn(
        &self,
        session_id: SessionId,
        player_action: &str,
    ) -> Result<TurnOutcome, PersistenceError> {
        let handle = SessionLockHandle::acquire(&self.session_locks, session_id);
        let _guard = handle.lock().lock_owned().await;

        let mut phases = vec![TurnPhase::Start];
        let mut session = self.load_or_create(session_id).await?;

        phases.push(TurnPhase::Retrieving);
        let context = self.fuser.build_context(&session, player_action).await;
        if context.is_degraded() {
            warn!(sources = ?context.degraded_sources, "Generating with partial context");
        }

        phases.push(TurnPhase::Generating);
        let seed = session.turn_counter + 1;
        let request = GenerationRequest::new(
            build_system_prompt(),
            build_user_prompt(&context, player_action),
        )
        .with_schema(story_turn_schema())
        .with_max_attempts(self.settings.max_provider_attempts)
        .with_timeout(self.settings.provider_timeout)
        .with_fallback_seed(seed);

        let result = self.generate_within_deadline(&request, seed).await;

        phases.push(TurnPhase::Validating);
        let facts = match result.fallback_reason() {
            Some(reason) => {
                phases.push(TurnPhase::Degraded);
                self.events.emit(EngineEvent::TurnDegraded {
                    session_id,
                    reason: reason.to_string(),
                });
                extract_facts(player_action)
            }
            None => result.facts.clone(),
        };

        phases.push(TurnPhase::Merging);
        let (world, merge) = self.merger.merge(&session.world, facts);
        session.world = world;
        self.report_merge(session_id, &merge);

        let turn = session.append_turn(player_action, &result.narrative, &result.options);
        self.sessions.save(&session).await?;
        phases.push(TurnPhase::Persisted);
        info!(turn, degraded = result.is_fallback(), "Turn persisted");

        self.sync_memory(&session, turn, &result.narrative, &merge.applied)
            .await;

        Ok(TurnOutcome {
            session_id,
            turn,
            narrative: result.narrative.clone(),
            options: result.options.clone(),
            facts_applied: merge.applied.len(),
            facts_skipped: merge.skipped.len(),
            degraded: result.is_fallback(),
            fallback_reason: result.fallback_reason(),
            phases,
        })
    }

    /// On expiry the in-flight generation is dropped; breaker state it
    /// already recorded stands
    async fn generate_within_deadline(
        &self,
        request: &GenerationRequest,
        seed: u64,
    ) -> GenerationResult {
        let generation = self.orchestrator.generate(request);
        match tokio::time::timeout(self.settings.turn_timeout, generation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.turn_timeout.as_secs(),
                    "Turn deadline expired during generation"
                );
                self.events.emit(EngineEvent::FallbackUsed {
                    reason: FallbackReason::TurnTimeout.to_string(),
                });
                fallback_result(seed, FallbackReason::TurnTimeout, 0)
            }
        }
    }

    fn report_merge(&self, session_id: SessionId, merge: &MergeOutcome) {
        if !merge.applied.is_empty() {
            self.events.emit(EngineEvent::FactsMerged {
                session_id,
                count: merge.applied.len(),
            });
        }

        let mut skipped: BTreeMap<&'static str, usize> = BTreeMap::new();
        for fact in &merge.skipped {
            *skipped.entry(fact.reason.as_str()).or_default() += 1;
        }
        for (reason, count) in skipped {
            self.events.emit(EngineEvent::FactsSkipped {
                session_id,
                count,
                reason: reason.to_string(),
            });
        }
    }

    /// Best effort: the turn is already saved, so failures are only logged
    async fn sync_memory(&self, session: &Session, turn: u64, narrative: &str, applied: &[Fact]) {
        let fragment = VectorFragment {
            session_id: session.id,
            turn,
            text: narrative.to_string(),
        };

        let graph_sync = async {
            for fact in applied {
                if let Err(e) = self.graph.apply(session.id, fact, turn).await {
                    warn!(error = %e, fact = %fact.key(), "Graph sync failed");
                    break;
                }
            }
        };
        let (vector_result, ()) = tokio::join!(self.vector.upsert(fragment), graph_sync);

        if let Err(e) = vector_result {
            warn!(error = %e, "Vector sync failed");
        }
    }
}
