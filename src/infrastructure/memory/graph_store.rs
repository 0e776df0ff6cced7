//! Fact graph adapters
//!
//! Facts are stored as `(:Entity)-[:FACT]->(:Entity)` edges keyed by
//! (session, subject, predicate, object). Re-applying a fact keeps the
//! higher certainty and the later turn.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};
use tokio::sync::RwLock;

use crate::application::ports::outbound::{GraphEdge, GraphStoreError, GraphStorePort};
use crate::domain::value_objects::{Fact, FactKey, FactKind, SessionId};

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct InMemoryGraphStore {
    edges: RwLock<HashMap<SessionId, HashMap<FactKey, GraphEdge>>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStorePort for InMemoryGraphStore {
    async fn apply(
        &self,
        session_id: SessionId,
        fact: &Fact,
        turn: u64,
    ) -> Result<(), GraphStoreError> {
        let mut edges = self.edges.write().await;
        let session = edges.entry(session_id).or_default();
        session
            .entry(fact.key())
            .and_modify(|edge| {
                edge.fact.certainty = edge.fact.certainty.max(fact.certainty);
                edge.turn = edge.turn.max(turn);
            })
            .or_insert_with(|| GraphEdge {
                fact: fact.clone(),
                turn,
            });
        Ok(())
    }

    async fn query(
        &self,
        session_id: SessionId,
        entity: &str,
    ) -> Result<Vec<GraphEdge>, GraphStoreError> {
        let entity = entity.trim();
        let edges = self.edges.read().await;
        let mut found: Vec<GraphEdge> = edges
            .get(&session_id)
            .map(|session| {
                session
                    .values()
                    .filter(|edge| {
                        edge.fact.subject.trim().eq_ignore_ascii_case(entity)
                            || edge.fact.object.trim().eq_ignore_ascii_case(entity)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by(|a, b| b.turn.cmp(&a.turn));
        Ok(found)
    }
}

// =============================================================================
// Neo4j
// =============================================================================

#[derive(Clone)]
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str, database: &str) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .db(database)
            .build()
            .context("Invalid Neo4j configuration")?;
        let graph = Graph::connect(config)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {uri}"))?;

        let store = Self { graph };
        store.initialize_schema().await?;
        tracing::info!("Connected to Neo4j at {}", uri);
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.graph
            .run(query(
                "CREATE INDEX entity_session_name IF NOT EXISTS
                FOR (e:Entity) ON (e.session_id, e.name)",
            ))
            .await
            .context("Failed to create entity index")?;
        Ok(())
    }
}

#[async_trait]
impl GraphStorePort for Neo4jGraphStore {
    async fn apply(
        &self,
        session_id: SessionId,
        fact: &Fact,
        turn: u64,
    ) -> Result<(), GraphStoreError> {
        let key = fact.key();
        let q = query(
            "MERGE (s:Entity {session_id: $session_id, name: $subject})
            MERGE (o:Entity {session_id: $session_id, name: $object})
            MERGE (s)-[r:FACT {predicate: $predicate}]->(o)
            ON CREATE SET r.kind = $kind, r.certainty = $certainty, r.turn = $turn
            ON MATCH SET
                r.certainty = CASE WHEN r.certainty < $certainty THEN $certainty ELSE r.certainty END,
                r.turn = CASE WHEN r.turn < $turn THEN $turn ELSE r.turn END",
        )
        .param("session_id", session_id.to_string())
        .param("subject", key.subject)
        .param("object", key.object)
        .param("predicate", key.predicate)
        .param("kind", fact.kind.as_str())
        .param("certainty", fact.certainty)
        .param("turn", turn as i64);

        self.graph
            .run(q)
            .await
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))
    }

    async fn query(
        &self,
        session_id: SessionId,
        entity: &str,
    ) -> Result<Vec<GraphEdge>, GraphStoreError> {
        let q = query(
            "MATCH (s:Entity {session_id: $session_id})-[r:FACT]->(o:Entity)
            WHERE s.name = $entity OR o.name = $entity
            RETURN s.name AS subject, r.predicate AS predicate, o.name AS object,
                   r.kind AS kind, r.certainty AS certainty, r.turn AS turn
            ORDER BY r.turn DESC",
        )
        .param("session_id", session_id.to_string())
        .param("entity", entity.trim());

        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;

        let mut edges = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| GraphStoreError::Query(e.to_string()))?
        {
            edges.push(row_to_edge(&row)?);
        }
        Ok(edges)
    }
}

fn row_to_edge(row: &Row) -> Result<GraphEdge, GraphStoreError> {
    let field = |e: neo4rs::DeError| GraphStoreError::Query(e.to_string());
    let kind: String = row.get("kind").map_err(field)?;
    let turn: i64 = row.get("turn").map_err(field)?;
    Ok(GraphEdge {
        fact: Fact::new(
            parse_kind(&kind),
            row.get::<String>("subject").map_err(field)?,
            row.get::<String>("predicate").map_err(field)?,
            row.get::<String>("object").map_err(field)?,
            row.get::<f64>("certainty").map_err(field)?,
        ),
        turn: u64::try_from(turn).unwrap_or_default(),
    })
}

fn parse_kind(kind: &str) -> FactKind {
    serde_json::from_value(serde_json::Value::String(kind.to_string())).unwrap_or(FactKind::Other)
}
