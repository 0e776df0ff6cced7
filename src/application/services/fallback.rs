//! Local fallback content used when no provider output can be trusted
//!
//! Selection is deterministic in the seed so a degraded turn can be
//! reproduced in tests and logs.

use crate::application::dto::{FallbackReason, GenerationResult, GenerationSource};

const FALLBACK_STORIES: &[&str] = &[
    "The scene shifts around you, and time seems to pause for a moment. As clarity returns, you find yourself considering your next move.",
    "A gentle breeze carries whispers of possibility. The path ahead remains yours to choose.",
    "The world around you settles into a moment of quiet anticipation, waiting for your decision.",
    "Time flows like water, and you find yourself at a crossroads, each path offering its own mysteries.",
];

const FALLBACK_OPTIONS: &[&str] = &[
    "Investigate the area",
    "Move forward cautiously",
    "Consider your options",
];

/// Build the fallback result for `seed`
pub fn fallback_result(seed: u64, reason: FallbackReason, attempts: u32) -> GenerationResult {
    let index = (seed % FALLBACK_STORIES.len() as u64) as usize;
    GenerationResult {
        narrative: FALLBACK_STORIES[index].to_string(),
        options: FALLBACK_OPTIONS.iter().map(|o| o.to_string()).collect(),
        facts: Vec::new(),
        source: GenerationSource::Fallback { reason },
        attempts,
    }
}
