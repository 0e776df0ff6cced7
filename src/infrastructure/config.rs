//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `taleforge.toml`, then `TALEFORGE_*` environment variables (nested keys
//! separated by `__`, e.g. `TALEFORGE_ENGINE__FAILURE_THRESHOLD=5`).
//!
//! Provider keys are read separately from `GOOGLE_API_KEY`, `GEMINI_API_KEY`
//! and `GEMINI_API_KEY_1` .. `GEMINI_API_KEY_9`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::application::services::{RetrievalSettings, TurnSettings};
use crate::domain::entities::{ApiKey, CredentialRecord};
use crate::domain::services::BreakerPolicy;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server port
    pub server_port: u16,
    pub llm: LlmConfig,
    pub engine: EngineConfig,
    pub vector: VectorConfig,
    pub graph: GraphConfig,
    pub session_store: SessionStoreConfig,
    /// Keys listed in the config file, in addition to the environment
    pub credentials: Vec<CredentialConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            llm: LlmConfig::default(),
            engine: EngineConfig::default(),
            vector: VectorConfig::default(),
            graph: GraphConfig::default(),
            session_store: SessionStoreConfig::default(),
            credentials: Vec::new(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.8,
        }
    }
}

/// Orchestration tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub failure_threshold: u32,
    pub base_cooldown_secs: u64,
    pub max_cooldown_secs: u64,
    pub max_provider_attempts: u32,
    pub provider_timeout_secs: u64,
    pub echo_retry_delay_ms: u64,
    pub retrieval_top_k: usize,
    pub retrieval_timeout_ms: u64,
    pub max_context_items: usize,
    pub recent_turn_window: usize,
    pub min_fact_certainty: f64,
    pub turn_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_cooldown_secs: 30,
            max_cooldown_secs: 600,
            max_provider_attempts: 3,
            provider_timeout_secs: 30,
            echo_retry_delay_ms: 500,
            retrieval_top_k: 5,
            retrieval_timeout_ms: 2000,
            max_context_items: 12,
            recent_turn_window: 8,
            min_fact_certainty: 0.5,
            turn_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn breaker_policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: self.failure_threshold,
            base_cooldown: Duration::from_secs(self.base_cooldown_secs),
            max_cooldown: Duration::from_secs(self.max_cooldown_secs),
            // A trial is a single provider call
            trial_timeout: Duration::from_secs(self.provider_timeout_secs.max(1)),
        }
    }

    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            top_k: self.retrieval_top_k,
            timeout: Duration::from_millis(self.retrieval_timeout_ms),
            max_items: self.max_context_items,
            recent_window: self.recent_turn_window,
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            max_provider_attempts: self.max_provider_attempts,
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            turn_timeout: Duration::from_secs(self.turn_timeout_secs),
        }
    }

    pub fn echo_retry_delay(&self) -> Duration {
        Duration::from_millis(self.echo_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    #[default]
    Memory,
    External,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub backend: VectorBackendKind,
    /// Base URL of the external vector service
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackendKind {
    #[default]
    Memory,
    Neo4j,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackendKind,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: Option<String>,
    pub neo4j_database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackendKind::Memory,
            neo4j_uri: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: None,
            neo4j_database: "neo4j".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionStoreConfig {
    pub backend: SessionStoreKind,
    pub sqlite_path: String,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            backend: SessionStoreKind::Memory,
            sqlite_path: "./data/sessions.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    pub id: String,
    pub key: String,
}

impl AppConfig {
    /// Load configuration from `taleforge.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name("taleforge").required(false))
            .add_source(
                config::Environment::with_prefix("TALEFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Credential records from the environment followed by the config file
    ///
    /// A key that appears under several names is only kept once.
    pub fn credential_records(&self) -> Vec<CredentialRecord> {
        let mut records = credentials_from(|name| std::env::var(name).ok());
        for credential in &self.credentials {
            push_unique(&mut records, &credential.id, &credential.key);
        }
        records
    }
}

/// Environment variable name and the credential id it yields
fn credential_sources() -> Vec<(String, String)> {
    let mut sources = vec![
        ("GOOGLE_API_KEY".to_string(), "google_api_key".to_string()),
        ("GEMINI_API_KEY".to_string(), "gemini_api_key".to_string()),
    ];
    sources.extend((1..=9).map(|i| (format!("GEMINI_API_KEY_{i}"), format!("key_{i}"))));
    sources
}

fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<CredentialRecord> {
    let mut records = Vec::new();
    for (variable, id) in credential_sources() {
        if let Some(secret) = lookup(&variable) {
            push_unique(&mut records, &id, &secret);
        }
    }
    records
}

fn push_unique(records: &mut Vec<CredentialRecord>, id: &str, secret: &str) {
    let secret = secret.trim();
    if secret.is_empty() || records.iter().any(|r| r.secret.expose() == secret) {
        return;
    }
    records.push(CredentialRecord::new(id, ApiKey::new(secret)));
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults_match_documented_tunables() {
        let config = AppConfig::default();
        let policy = config.engine.breaker_policy();
        assert_eq!(policy.failure_threshold, 3);
        assert_eq!(policy.base_cooldown, Duration::from_secs(30));
        assert_eq!(config.engine.retrieval_settings().top_k, 5);
        assert_eq!(config.engine.echo_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.vector.backend, VectorBackendKind::Memory);
    }

    #[test]
    fn test_toml_overrides_nested_sections() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                server_port = 8080

                [engine]
                failure_threshold = 5

                [graph]
                backend = "neo4j"
                neo4j_password = "secret"

                [[credentials]]
                id = "spare"
                key = "abc"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.engine.failure_threshold, 5);
        assert_eq!(config.engine.max_cooldown_secs, 600);
        assert_eq!(config.graph.backend, GraphBackendKind::Neo4j);
        assert_eq!(config.credentials[0].id, "spare");
    }

    #[test]
    fn test_credentials_discovered_in_order_without_duplicates() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "k-main"),
            ("GEMINI_API_KEY_2", "k-two"),
            ("GEMINI_API_KEY_1", "k-one"),
            ("GEMINI_API_KEY_3", "k-main"),
            ("GEMINI_API_KEY_4", "  "),
        ]
        .into_iter()
        .collect();

        let records = credentials_from(|name| env.get(name).map(|v| v.to_string()));
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["gemini_api_key", "key_1", "key_2"]);
    }
}
