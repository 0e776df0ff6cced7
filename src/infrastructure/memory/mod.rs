//! Long-term memory adapters: narrative vectors and the fact graph

mod graph_store;
mod vector_store;

pub use graph_store::{InMemoryGraphStore, Neo4jGraphStore};
pub use vector_store::{HttpVectorStore, InMemoryVectorStore};
