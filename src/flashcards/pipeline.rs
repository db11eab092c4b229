//! Generation pipeline - generate, extract, and repair once if needed.
//!
//! # States
//! ```text
//! Initial ──► Generated ──► Sufficient ─────────────► Done
//!                 │                                    ▲
//!                 └──► Repairing (fallback model) ─────┘
//!          (fatal LLM error) ──► Failed
//! ```
//!
//! # Rules
//! - A rate limit on the primary model is retried once on the fallback model.
//!   Any other generation failure, including one from that retry, is fatal.
//! - Repair runs when fewer than `min(count, 3)` cards were extracted. Its
//!   failures are logged and ignored.
//! - A repaired attempt replaces the original only with strictly more cards.

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    build_generation_prompt, build_repair_prompt, extract_cards, extract_trailing_message, Card,
    CardCount,
};
use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError, TokenUsage};

/// Notes shorter than this (after trimming) are rejected without a model call.
pub const MIN_NOTES_CHARS: usize = 10;

/// Upper bound of the repair trigger.
const REPAIR_THRESHOLD_CAP: usize = 3;

/// Output prefixes a model uses to decline instead of producing cards.
const DECLINE_PREFIXES: [&str; 3] = [
    "❌ Cannot generate SQR flashcards:",
    "Cannot generate SQR flashcards:",
    "⚠️ Only generated",
];

const NOTES_TOO_SHORT: &str = "❌ Cannot generate SQR flashcards:\n\
- Notes file is empty or too short.\n\
- Add more detailed notes (definitions, explanations, examples).";

/// Fewest cards a generation pass may return before a repair is attempted.
pub fn repair_threshold(count: CardCount) -> usize {
    count.get().min(REPAIR_THRESHOLD_CAP)
}

/// Models and prompt settings for a pipeline.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// System instructions sent with every request.
    pub system_prompt: String,
    pub primary_model: String,
    /// Used after a primary rate limit and for repair.
    pub fallback_model: String,
    pub temperature: f64,
}

impl GenerationSettings {
    pub fn from_config(config: &Config, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Generation,
    Repair,
}

/// One successful completion call and the cards extracted from it.
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub kind: AttemptKind,
    pub prompt: String,
    /// Model the request was sent to.
    pub model: String,
    pub raw_output: String,
    pub cards: Vec<Card>,
    pub usage: Option<TokenUsage>,
}

impl GenerationAttempt {
    fn new(kind: AttemptKind, prompt: String, model: &str, response: ChatResponse) -> Self {
        let cards = extract_cards(&response.content);
        Self {
            kind,
            prompt,
            model: model.to_string(),
            raw_output: response.content,
            cards,
            usage: response.usage,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// At least one card. `shortfall` holds the model's trailing explanation
    /// when fewer cards than requested were produced.
    Generated {
        cards: Vec<Card>,
        shortfall: Option<String>,
    },
    /// No cards, but the model (or the notes check) explained why.
    Declined { message: String },
    /// No cards and no recognizable explanation.
    NoCards { raw_output: String },
}

impl PipelineOutcome {
    /// Whether the run counts as a success for the caller (exit code 0).
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::NoCards { .. })
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub outcome: PipelineOutcome,
    /// Every completion call that returned, in call order.
    pub attempts: Vec<GenerationAttempt>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("OpenRouter request failed: {0}")]
    Generation(#[from] LlmError),
}

/// Drives prompt building, completion calls and card extraction.
pub struct FlashcardPipeline {
    llm: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl FlashcardPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate `count` flashcards from `notes`.
    ///
    /// # Errors
    /// Only when the generation pass fails for a reason other than a rate
    /// limit recovered by the fallback model.
    pub async fn run(&self, notes: &str, count: CardCount) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("flashcards", run_id = %run_id, count = count.get());
        self.run_inner(run_id, notes, count).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        notes: &str,
        count: CardCount,
    ) -> Result<PipelineRun, PipelineError> {
        if notes.trim().chars().count() < MIN_NOTES_CHARS {
            tracing::info!("Notes too short, skipping generation");
            return Ok(PipelineRun {
                run_id,
                outcome: PipelineOutcome::Declined {
                    message: NOTES_TOO_SHORT.to_string(),
                },
                attempts: Vec::new(),
            });
        }

        let initial = self.generate(notes, count).await?;
        tracing::info!(
            model = %initial.model,
            cards = initial.cards.len(),
            "Generation pass complete"
        );

        let mut attempts = vec![initial];
        let mut chosen = 0;

        let threshold = repair_threshold(count);
        if attempts[0].cards.len() < threshold {
            tracing::info!(
                cards = attempts[0].cards.len(),
                threshold,
                "Too few cards, attempting repair"
            );
            if let Some(repaired) = self.repair(notes, count, &attempts[0]).await {
                let improved = repaired.cards.len() > attempts[chosen].cards.len();
                tracing::info!(
                    cards = repaired.cards.len(),
                    improved,
                    "Repair pass complete"
                );
                attempts.push(repaired);
                if improved {
                    chosen = attempts.len() - 1;
                }
            }
        }

        let outcome = Self::finish(&attempts[chosen], count);
        Ok(PipelineRun {
            run_id,
            outcome,
            attempts,
        })
    }

    async fn complete(&self, model: &str, user_prompt: &str) -> Result<ChatResponse, LlmError> {
        let messages = [
            ChatMessage::system(self.settings.system_prompt.as_str()),
            ChatMessage::user(user_prompt),
        ];
        let options = ChatOptions {
            temperature: Some(self.settings.temperature),
            ..Default::default()
        };
        self.llm.chat_completion(model, &messages, options).await
    }

    async fn generate(
        &self,
        notes: &str,
        count: CardCount,
    ) -> Result<GenerationAttempt, PipelineError> {
        let prompt = build_generation_prompt(notes, count);
        let primary = self.settings.primary_model.as_str();

        let (model, response) = match self.complete(primary, &prompt).await {
            Ok(response) => (primary, response),
            Err(e) if e.is_rate_limited() => {
                let fallback = self.settings.fallback_model.as_str();
                tracing::info!(
                    model = %primary,
                    fallback = %fallback,
                    error = %e,
                    "Rate limited on primary model, retrying with fallback"
                );
                // A second rate limit is not retried.
                (fallback, self.complete(fallback, &prompt).await?)
            }
            Err(e) => {
                tracing::debug!(model = %primary, error = %e, "Generation request failed");
                return Err(e.into());
            }
        };

        Ok(GenerationAttempt::new(
            AttemptKind::Generation,
            prompt,
            model,
            response,
        ))
    }

    async fn repair(
        &self,
        notes: &str,
        count: CardCount,
        prior: &GenerationAttempt,
    ) -> Option<GenerationAttempt> {
        let prompt = build_repair_prompt(notes, count, &prior.raw_output);
        let model = self.settings.fallback_model.as_str();

        match self.complete(model, &prompt).await {
            Ok(response) => Some(GenerationAttempt::new(
                AttemptKind::Repair,
                prompt,
                model,
                response,
            )),
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "Repair failed, keeping original output");
                None
            }
        }
    }

    fn finish(attempt: &GenerationAttempt, count: CardCount) -> PipelineOutcome {
        if !attempt.cards.is_empty() {
            let shortfall = if attempt.cards.len() < count.get() {
                Some(extract_trailing_message(&attempt.raw_output)).filter(|m| !m.is_empty())
            } else {
                None
            };
            return PipelineOutcome::Generated {
                cards: attempt.cards.clone(),
                shortfall,
            };
        }

        let trimmed = attempt.raw_output.trim();
        if DECLINE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            PipelineOutcome::Declined {
                message: trimmed.to_string(),
            }
        } else {
            PipelineOutcome::NoCards {
                raw_output: attempt.raw_output.clone(),
            }
        }
    }
}
