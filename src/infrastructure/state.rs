//! Shared application state

use std::sync::Arc;

use anyhow::Result;

use crate::application::ports::outbound::{
    CredentialPoolPort, GraphStorePort, SessionStorePort, StructuredGenerationPort,
    TextClassifier, VectorStorePort,
};
use crate::application::services::{
    BannedTermInputFilter, GenerationOrchestrator, InMemoryCredentialPool, PhraseEchoFilter,
    RetrievalFuser, TurnController,
};
use crate::domain::entities::CredentialRecord;
use crate::domain::services::WorldStateMerger;
use crate::infrastructure::backends::{GraphBackend, SessionStoreBackend, VectorBackend};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::llm_client::OpenAiCompatibleClient;
use crate::infrastructure::observability::{SystemClock, TracingEventSink};

/// Shared application state
pub struct AppState {
    pub turns: TurnController,
    /// Screens player actions before any generation work
    pub input_filter: Arc<dyn TextClassifier>,
    pub pool: Arc<dyn CredentialPoolPort>,
    pub sessions: Arc<dyn SessionStorePort>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let records = config.credential_records();
        if records.is_empty() {
            tracing::warn!(
                "No provider credentials configured; every turn will use fallback content"
            );
        }
        let provider = Arc::new(OpenAiCompatibleClient::new(&config.llm));
        Self::assemble(config, records, provider).await
    }

    /// Wire the services around an arbitrary provider
    pub async fn assemble(
        config: AppConfig,
        records: Vec<CredentialRecord>,
        provider: Arc<dyn StructuredGenerationPort>,
    ) -> Result<Self> {
        let vector = VectorBackend::from_config(&config.vector)?;
        let graph = GraphBackend::from_config(&config.graph).await?;
        let store = SessionStoreBackend::from_config(&config.session_store).await?;
        tracing::info!(
            vector = vector.name(),
            graph = graph.name(),
            sessions = store.name(),
            credentials = records.len(),
            "Backends selected"
        );

        let vector: Arc<dyn VectorStorePort> = Arc::new(vector);
        let graph: Arc<dyn GraphStorePort> = Arc::new(graph);
        let sessions: Arc<dyn SessionStorePort> = Arc::new(store);
        let pool: Arc<dyn CredentialPoolPort> = Arc::new(InMemoryCredentialPool::new(
            records,
            config.engine.breaker_policy(),
        ));
        let events = Arc::new(TracingEventSink);

        let fuser = RetrievalFuser::new(
            vector.clone(),
            graph.clone(),
            config.engine.retrieval_settings(),
        );
        let orchestrator = GenerationOrchestrator::new(
            pool.clone(),
            provider,
            Arc::new(PhraseEchoFilter::default()),
            events.clone(),
            Arc::new(SystemClock),
        )
        .with_echo_retry_delay(config.engine.echo_retry_delay());

        let turns = TurnController::new(
            sessions.clone(),
            vector,
            graph,
            events,
            fuser,
            orchestrator,
            WorldStateMerger::new(config.engine.min_fact_certainty),
            config.engine.turn_settings(),
        );

        Ok(Self {
            turns,
            input_filter: Arc::new(BannedTermInputFilter::default()),
            pool,
            sessions,
        })
    }
}
