//! LLM request construction

pub mod prompt_builder;

pub use prompt_builder::{build_system_prompt, build_user_prompt, story_turn_schema};
