//! `OpenAI`-compatible chat completions provider.
//!
//! Groq, Novita.ai and `OpenAI` itself accept the same request shape, so a
//! single implementation covers all three. Self-hosted servers work too via
//! a base URL override.

use std::time::Duration;

use crisis_triage_config::AiProviderKind;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmProvider, Role};
use crate::AiError;

/// Groq chat completions endpoint.
pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
/// Default Groq model.
pub const GROQ_DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Novita.ai chat completions endpoint.
pub const NOVITA_ENDPOINT: &str = "https://api.novita.ai/v3/openai/chat/completions";
/// Default Novita.ai model.
pub const NOVITA_DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";

/// `OpenAI` chat completions endpoint.
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default `OpenAI` model.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Returns the `(endpoint, model)` defaults for an `OpenAI`-compatible
/// provider kind.
#[must_use]
pub const fn defaults_for(kind: AiProviderKind) -> (&'static str, &'static str) {
    match kind {
        AiProviderKind::Novita => (NOVITA_ENDPOINT, NOVITA_DEFAULT_MODEL),
        AiProviderKind::OpenAi => (OPENAI_ENDPOINT, OPENAI_DEFAULT_MODEL),
        AiProviderKind::Groq | AiProviderKind::Anthropic => (GROQ_ENDPOINT, GROQ_DEFAULT_MODEL),
    }
}

/// Provider for any `OpenAI`-compatible chat completions API.
pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Creates a new provider posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        model: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        Ok(Self {
            name: name.into(),
            api_key,
            model,
            endpoint,
            client: super::http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

fn build_request<'a>(model: &'a str, request: &'a CompletionRequest) -> OpenAiRequest<'a> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(OpenAiMessage {
            role: Role::System,
            content: system,
        });
    }
    messages.extend(request.messages.iter().map(|m| OpenAiMessage {
        role: m.role,
        content: &m.content,
    }));

    OpenAiRequest {
        model,
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        response_format: request.json_output.then_some(ResponseFormat {
            format_type: "json_object",
        }),
    }
}

fn parse_response(body: &str) -> Result<String, AiError> {
    let response: OpenAiResponse = serde_json::from_str(body)?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AiError::Provider {
            message: "No content in chat completion response".to_string(),
        })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let body = build_request(&self.model, request);

        log::debug!(
            "[{}] Sending completion request to {} (model {})",
            self.name,
            self.endpoint,
            self.model
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: OpenAiError = serde_json::from_str(&body).unwrap_or_else(|_| OpenAiError {
                error: OpenAiErrorDetail {
                    message: format!("HTTP {status}: {body}"),
                },
            });
            return Err(AiError::Provider {
                message: err.error.message,
            });
        }

        parse_response(&body)
    }
}
