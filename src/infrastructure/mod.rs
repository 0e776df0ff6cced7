//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - LLM client: OpenAI-compatible structured generation
//! - Memory: vector and fact-graph stores (in-memory, HTTP, Neo4j)
//! - Persistence: session stores (in-memory, SQLite)
//! - Backends: configuration-driven adapter selection
//! - HTTP: REST API routes
//! - Config and shared application state

pub mod backends;
pub mod config;
pub mod http;
pub mod llm_client;
pub mod memory;
pub mod observability;
pub mod persistence;
pub mod state;
