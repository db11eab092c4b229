//! Flashcard generation from study notes.
//!
//! # Flow
//! ```text
//! notes ──► generation prompt ──► primary model ──(429)──► fallback model
//!                                      │
//!                                extract cards
//!                                      │  fewer than min(count, 3)?
//!                                      ▼
//!                      repair prompt ──► fallback model ──► keep if more cards
//! ```
//!
//! Cards are delimited blocks of model output:
//! `=== CARD <n> ===` ... `===`. Anything after the last delimiter is the
//! trailing message, used by the model to explain a shortfall.

mod extract;
mod pipeline;
mod prompts;

pub use extract::{extract_cards, extract_trailing_message, Card};
pub use pipeline::{
    repair_threshold, AttemptKind, FlashcardPipeline, GenerationAttempt, GenerationSettings,
    PipelineError, PipelineOutcome, PipelineRun, MIN_NOTES_CHARS,
};
pub use prompts::{build_generation_prompt, build_repair_prompt};

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of cards a run asks for.
///
/// # Invariant
/// `CardCount::MIN <= value <= CardCount::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CardCount(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("--count must be between 1 and 5")]
pub struct CardCountError;

impl CardCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, CardCountError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CardCountError)
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for CardCount {
    fn default() -> Self {
        Self(3)
    }
}

impl fmt::Display for CardCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardCount {
    type Err = CardCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s.trim().parse().map_err(|_| CardCountError)?;
        Self::new(value)
    }
}
