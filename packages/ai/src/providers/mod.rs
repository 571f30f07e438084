//! LLM provider abstraction and implementations.
//!
//! Groq, Novita.ai and `OpenAI` share one implementation since they all
//! speak the `OpenAI` chat completions protocol; Anthropic has its own.

pub mod anthropic;
pub mod openai;

use std::time::Duration;

use crisis_triage_config::{AiConfig, AiProviderKind};
use serde::{Deserialize, Serialize};

use crate::AiError;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt, if any.
    pub system: Option<String>,
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Ask the backend to constrain output to a JSON object, where supported.
    pub json_output: bool,
}

impl CompletionRequest {
    /// Creates a request with a single user message.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(prompt)],
            temperature: 0.0,
            max_tokens: 1024,
            json_output: false,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Requests JSON object output.
    #[must_use]
    pub const fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short name for logs (e.g. `groq`).
    fn name(&self) -> &str;

    /// Sends a completion request and returns the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the response has no
    /// text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;
}

/// Creates the LLM provider selected by `config`.
///
/// # Errors
///
/// Returns [`AiError::Config`] if the selected provider has no API key,
/// or [`AiError::Http`] if the HTTP client cannot be built.
pub fn create_provider(config: &AiConfig) -> Result<Box<dyn LlmProvider>, AiError> {
    let api_key = config
        .api_key()
        .ok_or_else(|| AiError::Config {
            message: format!("No API key configured for provider '{}'", config.provider),
        })?
        .to_string();
    let timeout = Duration::from_secs(config.timeout_secs);

    let provider: Box<dyn LlmProvider> = match config.provider {
        AiProviderKind::Groq | AiProviderKind::Novita | AiProviderKind::OpenAi => {
            let (endpoint, model) = openai::defaults_for(config.provider);
            Box::new(openai::OpenAiCompatibleProvider::new(
                config.provider.as_ref(),
                api_key,
                config.model.clone().unwrap_or_else(|| model.to_string()),
                config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| endpoint.to_string()),
                timeout,
            )?)
        }
        AiProviderKind::Anthropic => Box::new(anthropic::AnthropicProvider::new(
            api_key,
            config
                .model
                .clone()
                .unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string()),
            timeout,
        )?),
    };

    log::info!("Using LLM provider: {}", provider.name());

    Ok(provider)
}

/// Builds the HTTP client shared by the provider implementations.
fn http_client(timeout: Duration) -> Result<reqwest::Client, AiError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
