#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Language-model integration for crisis triage.
//!
//! Supports Groq, Novita.ai, and `OpenAI` (all through the `OpenAI`-compatible
//! chat completions API) and Anthropic Claude behind a common
//! [`providers::LlmProvider`] trait. On top of that sit the report
//! [`extractor`], which turns free text into an
//! [`ExtractedReport`](crisis_triage_report_models::ExtractedReport), and
//! fundraising [`appeal`] generation.

pub mod appeal;
pub mod extractor;
pub mod providers;

use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// Nothing was given to generate from.
    #[error("No input provided")]
    EmptyInput,
}
