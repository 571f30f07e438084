//! Anthropic Claude provider implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmProvider, Role};
use crate::AiError;

/// Anthropic messages endpoint.
pub const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default Claude model.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, AiError> {
        Ok(Self {
            api_key,
            model,
            client: super::http_client(timeout)?,
        })
    }
}

/// Anthropic API request body.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: Role,
    content: &'a str,
}

/// Anthropic API response body.
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Anthropic API error response.
#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

fn build_request<'a>(model: &'a str, request: &'a CompletionRequest) -> AnthropicRequest<'a> {
    // Claude has no JSON mode; the instruction goes in the system prompt.
    let system = match (&request.system, request.json_output) {
        (Some(system), true) => Some(format!(
            "{system}\n\nRespond with a single JSON object and nothing else."
        )),
        (Some(system), false) => Some(system.clone()),
        (None, true) => Some("Respond with a single JSON object and nothing else.".to_string()),
        (None, false) => None,
    };

    AnthropicRequest {
        model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system,
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role,
                content: &m.content,
            })
            .collect(),
    }
}

fn parse_response(body: &str) -> Result<String, AiError> {
    let response: AnthropicResponse = serde_json::from_str(body)?;

    let text = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text),
            AnthropicContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(AiError::Provider {
            message: "No text content in Anthropic response".to_string(),
        });
    }

    Ok(text)
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let body = build_request(&self.model, request);

        let resp = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: AnthropicError =
                serde_json::from_str(&body).unwrap_or_else(|_| AnthropicError {
                    error: AnthropicErrorDetail {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_is_requested_through_system_prompt() {
        let request = CompletionRequest::new("Fire at the school")
            .with_system("You triage reports.")
            .json();
        let json = serde_json::to_value(build_request(DEFAULT_MODEL, &request)).unwrap();

        let system = json["system"].as_str().unwrap();
        assert!(system.starts_with("You triage reports."));
        assert!(system.contains("single JSON object"));
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Fire at the school");
    }

    #[test]
    fn no_system_field_without_system_prompt() {
        let request = CompletionRequest::new("hi");
        let json = serde_json::to_value(build_request(DEFAULT_MODEL, &request)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let body = r#"{"content":[
            {"type":"text","text":"first"},
            {"type":"thinking","thinking":"..."},
            {"type":"text","text":"second"}
        ]}"#;
        assert_eq!(parse_response(body).unwrap(), "first\nsecond");
    }

    #[test]
    fn empty_content_is_provider_error() {
        assert!(matches!(
            parse_response(r#"{"content":[]}"#),
            Err(AiError::Provider { .. })
        ));
    }
}
