//! cardsmith - flashcards and token costs for OpenRouter completions.
//!
//! # Modules
//! - [`llm`]: chat completion client trait and the OpenRouter implementation
//! - [`cost`]: model pricing lookup and per-call cost calculation
//! - [`flashcards`]: prompt building, card extraction and the generation pipeline
//! - [`config`]: configuration loaded once from the environment
//! - [`logging`]: tracing subscriber set-up for the binaries

pub mod config;
pub mod cost;
pub mod flashcards;
pub mod llm;
pub mod logging;

pub use config::Config;
