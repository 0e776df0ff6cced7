//! Retrieval Fuser - builds the context bundle for the next generation
//!
//! Vector search (prior narrative similar to the action) and graph lookups
//! (facts touching entities in play) run concurrently, each under the
//! retrieval timeout. A failing or slow source is left out and recorded in
//! `degraded_sources`; retrieval never fails the turn. The graph source is
//! only degraded when none of its per-entity lookups answered.
//!
//! Ranking: graph facts above vector fragments, then by score, then by
//! recency. Items are deduplicated by identity and truncated.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::application::dto::{ContextBundle, ContextItem, ContextSource};
use crate::application::ports::outbound::{GraphEdge, GraphStorePort, VectorHit, VectorStorePort};
use crate::application::services::fact_extractor::PLAYER;
use crate::domain::entities::{Session, WorldState};

#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    /// Vector hits requested per query
    pub top_k: usize,
    /// Deadline for each source
    pub timeout: Duration,
    /// Cap on fused context items
    pub max_items: usize,
    /// History entries copied into the bundle
    pub recent_window: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            timeout: Duration::from_secs(2),
            max_items: 12,
            recent_window: 8,
        }
    }
}

pub struct RetrievalFuser {
    vector: Arc<dyn VectorStorePort>,
    graph: Arc<dyn GraphStorePort>,
    settings: RetrievalSettings,
}

impl RetrievalFuser {
    pub fn new(
        vector: Arc<dyn VectorStorePort>,
        graph: Arc<dyn GraphStorePort>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            vector,
            graph,
            settings,
        }
    }

    /// Read-only: neither the session nor the stores are modified
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn build_context(&self, session: &Session, player_action: &str) -> ContextBundle {
        let entities = entities_in_play(&session.world, player_action);
        debug!(entities = ?entities, "Resolved entities for graph lookup");

        let (vector, graph) = tokio::join!(
            self.query_vector(session, player_action),
            self.query_graph(session, &entities)
        );

        let recent_turns = session.recent_turns(self.settings.recent_window).to_vec();
        let mut degraded_sources = Vec::new();
        let mut items = Vec::new();

        match graph {
            Some(edges) => items.extend(edges.into_iter().map(graph_item)),
            None => degraded_sources.push(ContextSource::Graph),
        }
        match vector {
            Some(hits) => {
                let recent: HashSet<String> =
                    recent_turns.iter().map(|turn| normalize(&turn.text)).collect();
                items.extend(
                    hits.into_iter()
                        .map(vector_item)
                        .filter(|item| !recent.contains(&item.key)),
                );
            }
            None => degraded_sources.push(ContextSource::Vector),
        }

        ContextBundle {
            items: fuse(items, self.settings.max_items),
            recent_turns,
            world_summary: session.world.summary(),
            degraded_sources,
        }
    }

    async fn query_vector(&self, session: &Session, text: &str) -> Option<Vec<VectorHit>> {
        let query = self.vector.query(session.id, text, self.settings.top_k);
        match tokio::time::timeout(self.settings.timeout, query).await {
            Ok(Ok(hits)) => Some(hits),
            Ok(Err(e)) => {
                warn!(error = %e, "Vector retrieval failed, continuing without it");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "Vector retrieval timed out"
                );
                None
            }
        }
    }

    /// One lookup per entity, each under the retrieval timeout
    ///
    /// Edges from lookups that succeeded are kept; `None` only when every
    /// lookup failed or timed out.
    async fn query_graph(&self, session: &Session, entities: &[String]) -> Option<Vec<GraphEdge>> {
        let timeout = self.settings.timeout;
        let lookups = entities.iter().map(|entity| async move {
            let lookup = tokio::time::timeout(timeout, self.graph.query(session.id, entity)).await;
            (entity, lookup)
        });

        let mut edges = Vec::new();
        let mut failed = 0usize;
        for (entity, lookup) in join_all(lookups).await {
            match lookup {
                Ok(Ok(found)) => edges.extend(found),
                Ok(Err(e)) => {
                    warn!(entity = %entity, error = %e, "Graph lookup failed, skipping entity");
                    failed += 1;
                }
                Err(_) => {
                    warn!(
                        entity = %entity,
                        timeout_ms = timeout.as_millis() as u64,
                        "Graph lookup timed out, skipping entity"
                    );
                    failed += 1;
                }
            }
        }

        if !entities.is_empty() && failed == entities.len() {
            return None;
        }
        Some(edges)
    }
}

/// Entities named in the action plus everything colocated with the player
fn entities_in_play(world: &WorldState, player_action: &str) -> Vec<String> {
    let action_words = words(player_action);
    let mut seen = HashSet::new();

    world
        .entity_names()
        .filter(|name| mentions(&action_words, name))
        .map(str::to_string)
        .chain(world.colocated_with(PLAYER))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn mentions(haystack: &[String], name: &str) -> bool {
    let needle = words(name);
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn graph_item(edge: GraphEdge) -> ContextItem {
    ContextItem {
        key: edge.fact.key().to_string(),
        text: edge.fact.describe(),
        source: ContextSource::Graph,
        score: edge.fact.certainty,
        turn: edge.turn,
    }
}

fn vector_item(hit: VectorHit) -> ContextItem {
    ContextItem {
        key: normalize(&hit.text),
        text: hit.text,
        source: ContextSource::Vector,
        score: hit.score,
        turn: hit.turn,
    }
}

/// Rank, deduplicate by key keeping the best-ranked copy, and truncate
fn fuse(mut items: Vec<ContextItem>, max_items: usize) -> Vec<ContextItem> {
    items.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| b.turn.cmp(&a.turn))
    });

    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.key.clone()));
    items.truncate(max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        FailingGraphStore, FailingVectorStore, HangingGraphStore, StaticGraphStore,
        StaticVectorStore,
    };
    use crate::domain::services::WorldStateMerger;
    use crate::domain::value_objects::{Fact, FactKind, SessionId};

    fn hit(text: &str, score: f64, turn: u64) -> VectorHit {
        VectorHit {
            text: text.to_string(),
            score,
            turn,
        }
    }

    fn edge(subject: &str, predicate: &str, object: &str, certainty: f64, turn: u64) -> GraphEdge {
        GraphEdge {
            fact: Fact::new(FactKind::Relation, subject, predicate, object, certainty),
            turn,
        }
    }

    fn session_in_clearing() -> Session {
        let mut session = Session::new(SessionId::new());
        WorldStateMerger::default().apply(
            &mut session.world,
            vec![
                Fact::new(FactKind::Location, "Player", "is at", "Clearing", 0.9),
                Fact::new(FactKind::Location, "Hermit", "is at", "Clearing", 0.9),
                Fact::new(FactKind::Possession, "Mara", "owns", "silver key", 0.9),
            ],
        );
        session
    }

    fn settings() -> RetrievalSettings {
        RetrievalSettings {
            timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[test]
    fn test_entities_include_named_and_colocated() {
        let session = session_in_clearing();
        let entities = entities_in_play(&session.world, "Ask Mara about the silver key");
        assert!(entities.contains(&"Mara".to_string()));
        assert!(entities.contains(&"silver key".to_string()));
        assert!(entities.contains(&"Clearing".to_string()));
        assert!(entities.contains(&"Hermit".to_string()));
        assert!(!entities.contains(&"Player".to_string()));
    }

    #[test]
    fn test_partial_word_is_not_a_mention() {
        let session = session_in_clearing();
        let entities = entities_in_play(&session.world, "Marathon runners pass by");
        assert!(!entities.contains(&"Mara".to_string()));
    }

    #[tokio::test]
    async fn test_graph_ranks_above_vector_and_duplicates_collapse() {
        let graph = StaticGraphStore::new(vec![
            edge("Hermit", "distrusts", "Mara", 0.6, 1),
            edge("Hermit", "guards", "Clearing", 0.9, 2),
        ]);
        let vector = StaticVectorStore::new(vec![hit("The hermit mutters.", 0.95, 3)]);
        let fuser = RetrievalFuser::new(Arc::new(vector), Arc::new(graph), settings());

        let bundle = fuser
            .build_context(&session_in_clearing(), "talk to Mara")
            .await;

        let texts: Vec<&str> = bundle.items.iter().map(|i| i.text.as_str()).collect();
        // "Hermit distrusts Mara" is found via both Mara and Hermit but appears once
        assert_eq!(
            texts,
            vec!["Hermit guards Clearing", "Hermit distrusts Mara", "The hermit mutters."]
        );
        assert!(!bundle.is_degraded());
    }

    #[tokio::test]
    async fn test_ties_broken_by_recency_and_truncated() {
        let vector = StaticVectorStore::new(vec![
            hit("old echo", 0.5, 1),
            hit("new echo", 0.5, 4),
            hit("middle echo", 0.5, 2),
        ]);
        let fuser = RetrievalFuser::new(
            Arc::new(vector),
            Arc::new(StaticGraphStore::new(vec![])),
            RetrievalSettings {
                max_items: 2,
                ..settings()
            },
        );

        let bundle = fuser.build_context(&Session::new(SessionId::new()), "look").await;
        let texts: Vec<&str> = bundle.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["new echo", "middle echo"]);
    }

    #[tokio::test]
    async fn test_vector_failure_degrades_to_graph_only() {
        let graph = StaticGraphStore::new(vec![edge("Hermit", "guards", "Clearing", 0.9, 2)]);
        let fuser = RetrievalFuser::new(Arc::new(FailingVectorStore), Arc::new(graph), settings());

        let bundle = fuser.build_context(&session_in_clearing(), "wait").await;
        assert_eq!(bundle.degraded_sources, vec![ContextSource::Vector]);
        assert_eq!(bundle.items.len(), 1);
    }

    #[tokio::test]
    async fn test_both_sources_down_yields_empty_context() {
        let fuser = RetrievalFuser::new(
            Arc::new(FailingVectorStore),
            Arc::new(FailingGraphStore),
            settings(),
        );

        let session = session_in_clearing();
        let bundle = fuser.build_context(&session, "wait").await;
        assert!(bundle.items.is_empty());
        assert_eq!(bundle.degraded_sources.len(), 2);
        assert_eq!(bundle.recent_turns.len(), 1);
        assert_eq!(bundle.world_summary, session.world.summary());
    }

    #[tokio::test]
    async fn test_one_failed_entity_keeps_other_graph_edges() {
        let graph = StaticGraphStore::new(vec![
            edge("Hermit", "guards", "Clearing", 0.9, 2),
            edge("Mara", "hides", "letter", 0.8, 1),
        ])
        .with_unreachable_entity("Mara");
        let fuser = RetrievalFuser::new(
            Arc::new(StaticVectorStore::new(vec![])),
            Arc::new(graph),
            settings(),
        );

        let bundle = fuser
            .build_context(&session_in_clearing(), "Ask Mara about the silver key")
            .await;

        let texts: Vec<&str> = bundle.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Hermit guards Clearing"]);
        assert!(!bundle.degraded_sources.contains(&ContextSource::Graph));
    }

    #[tokio::test]
    async fn test_hanging_graph_times_out() {
        let vector = StaticVectorStore::new(vec![hit("A fox watches.", 0.7, 1)]);
        let fuser = RetrievalFuser::new(Arc::new(vector), Arc::new(HangingGraphStore), settings());

        let bundle = fuser.build_context(&session_in_clearing(), "wait").await;
        assert_eq!(bundle.degraded_sources, vec![ContextSource::Graph]);
        assert_eq!(bundle.items.len(), 1);
    }

    #[tokio::test]
    async fn test_fragments_already_in_recent_history_are_dropped() {
        let session = Session::new(SessionId::new());
        let vector = StaticVectorStore::new(vec![hit(&session.history[0].text, 0.9, 0)]);
        let fuser = RetrievalFuser::new(
            Arc::new(vector),
            Arc::new(StaticGraphStore::new(vec![])),
            settings(),
        );
        let bundle = fuser.build_context(&session, "look").await;
        assert!(bundle.items.is_empty());
    }
}
