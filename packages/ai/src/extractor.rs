//! Free-text report extraction.
//!
//! An [`Extractor`] turns a raw emergency message into an
//! [`ExtractedReport`]. The production backend, [`LlmExtractor`], prompts a
//! language model with the report's JSON schema and parses its reply.
//! Extraction may fail for many reasons (network, quota, a model that
//! ignores instructions), so callers on the ingestion path use
//! [`extract_or_fallback`], which never fails.

use std::sync::Arc;

use crisis_triage_config::AiConfig;
use crisis_triage_report_models::{ExtractedReport, InjurySeverity, MAX_URGENCY, MIN_URGENCY};

use crate::AiError;
use crate::providers::{CompletionRequest, LlmProvider, create_provider};

/// Turns free-text reports into structured attributes.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts structured attributes from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the backend fails or its output cannot be
    /// interpreted as a report.
    async fn extract(&self, text: &str) -> Result<ExtractedReport, AiError>;
}

/// JSON schema of [`ExtractedReport`], embedded in the extraction prompt.
#[must_use]
pub fn report_schema() -> serde_json::Value {
    let severities: Vec<&str> = InjurySeverity::all().iter().map(AsRef::as_ref).collect();

    serde_json::json!({
        "title": "ExtractedReport",
        "type": "object",
        "properties": {
            "urgency": {
                "type": "integer",
                "minimum": MIN_URGENCY,
                "maximum": MAX_URGENCY,
                "description": "Immediacy of the threat to life: 1 = no threat, 10 = mortal danger right now."
            },
            "vulnerable_individuals": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Vulnerable groups mentioned, e.g. 'children', 'elderly', 'pregnant woman', 'disabled'."
            },
            "injury_severity": {
                "type": "string",
                "enum": severities,
                "description": "Worst injury described."
            },
            "people_affected": {
                "type": "integer",
                "minimum": 1,
                "description": "Best estimate of the number of people at risk."
            },
            "latitude": {
                "type": ["number", "null"],
                "description": "Estimated latitude if a location is identifiable."
            },
            "longitude": {
                "type": ["number", "null"],
                "description": "Estimated longitude if a location is identifiable."
            },
            "summary": {
                "type": "string",
                "description": "One-sentence summary of the incident."
            },
            "resource_needs": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Resources requested, e.g. 'ambulance', 'boat', 'insulin', 'heavy machinery'."
            }
        },
        "required": ["urgency", "injury_severity", "people_affected", "summary"]
    })
}

fn system_prompt() -> String {
    format!(
        "You are an AI Triage Specialist for an international rescue organization. \
         Your sole task is to analyze an incoming emergency report and convert it into \
         a structured JSON object. Precision is critical.\n\
         - Your entire output MUST be a single, valid JSON object that strictly adheres \
         to this schema: {}\n\
         - Do not add any text before or after the JSON object.",
        report_schema()
    )
}

/// Parses a model reply into a report.
///
/// Tolerates prose or code fences around the object by parsing the span
/// from the first `{` to the last `}`.
///
/// # Errors
///
/// Returns [`AiError::Provider`] if the reply contains no JSON object, or
/// [`AiError::Json`] if the object is malformed.
pub fn parse_report_json(reply: &str) -> Result<ExtractedReport, AiError> {
    let object = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(AiError::Provider {
                message: format!("No JSON object in model reply: {reply}"),
            });
        }
    };

    let mut report: ExtractedReport = serde_json::from_str(object)?;
    report.fallback = false;
    Ok(report)
}

/// Extractor backed by a language model.
pub struct LlmExtractor {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
}

impl LlmExtractor {
    /// Creates an extractor that prompts `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt(),
        }
    }
}

#[async_trait::async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractedReport, AiError> {
        let request = CompletionRequest::new(format!("EMERGENCY REPORT: '{text}'"))
            .with_system(self.system_prompt.clone())
            .with_temperature(0.0)
            .json();

        let reply = self.provider.complete(&request).await?;
        log::trace!("[{}] Extraction reply: {reply}", self.provider.name());

        parse_report_json(&reply)
    }
}

/// Extractor used when no language model is configured. Always fails.
pub struct UnavailableExtractor {
    reason: String,
}

impl UnavailableExtractor {
    /// Creates an extractor that fails with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl Extractor for UnavailableExtractor {
    async fn extract(&self, _text: &str) -> Result<ExtractedReport, AiError> {
        Err(AiError::Config {
            message: self.reason.clone(),
        })
    }
}

/// Creates the extractor for `config`, alongside the provider it uses.
///
/// A missing API key is not fatal: the service still runs and stores
/// every report with the fallback attributes.
#[must_use]
pub fn create_extractor(config: &AiConfig) -> (Arc<dyn Extractor>, Option<Arc<dyn LlmProvider>>) {
    match create_provider(config) {
        Ok(provider) => {
            let provider: Arc<dyn LlmProvider> = Arc::from(provider);
            (
                Arc::new(LlmExtractor::new(Arc::clone(&provider))),
                Some(provider),
            )
        }
        Err(e) => {
            log::warn!("LLM extraction disabled: {e}");
            (Arc::new(UnavailableExtractor::new(e.to_string())), None)
        }
    }
}

/// Extracts `text`, substituting [`ExtractedReport::extraction_failed`] on
/// any failure.
pub async fn extract_or_fallback(extractor: &dyn Extractor, text: &str) -> ExtractedReport {
    match extractor.extract(text).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Report extraction failed, using fallback: {e}");
            ExtractedReport::extraction_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedProvider {
        reply: Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(vec![]),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(|message| AiError::Provider { message })
        }
    }

    #[test]
    fn parses_bare_object() {
        let report = parse_report_json(
            r#"{"urgency": 9, "injury_severity": "Critical", "people_affected": 3,
                "summary": "Collapsed building", "vulnerable_individuals": ["children"]}"#,
        )
        .unwrap();
        assert_eq!(report.urgency, 9);
        assert_eq!(report.injury_severity, InjurySeverity::Critical);
        assert_eq!(report.vulnerable_individuals, vec!["children"]);
    }

    #[test]
    fn parses_object_inside_code_fence() {
        let reply = "Here is the report:\n```json\n{\"urgency\": 4, \"summary\": \"Flooded road\"}\n```";
        let report = parse_report_json(reply).unwrap();
        assert_eq!(report.urgency, 4);
        assert_eq!(report.summary, "Flooded road");
    }

    #[test]
    fn rejects_reply_without_object() {
        assert!(matches!(
            parse_report_json("I cannot help with that."),
            Err(AiError::Provider { .. })
        ));
        assert!(matches!(
            parse_report_json("} backwards {"),
            Err(AiError::Provider { .. })
        ));
        assert!(matches!(
            parse_report_json("{\"urgency\": }"),
            Err(AiError::Json(_))
        ));
    }

    #[test]
    fn schema_lists_every_severity_tier() {
        let schema = report_schema();
        let tiers = schema["properties"]["injury_severity"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(tiers.len(), 4);
        assert_eq!(tiers[3], "Critical");
    }

    #[tokio::test]
    async fn llm_extractor_sends_schema_prompt_in_json_mode() {
        let provider = ScriptedProvider::replying(
            r#"{"urgency": 7, "injury_severity": "serious", "summary": "Crash"}"#,
        );
        let extractor = LlmExtractor::new(provider.clone());

        let report = extractor.extract("Car crash, driver bleeding").await.unwrap();
        assert_eq!(report.injury_severity, InjurySeverity::Serious);

        let seen = provider.seen.lock().unwrap();
        let request = &seen[0];
        assert!(request.json_output);
        assert!(request.temperature.abs() < f32::EPSILON);
        assert!(request.system.as_deref().unwrap().contains("\"resource_needs\""));
        assert!(request.messages[0].content.contains("Car crash, driver bleeding"));
        drop(seen);
    }

    #[tokio::test]
    async fn fallback_on_provider_failure() {
        let extractor = LlmExtractor::new(ScriptedProvider::failing("rate limited"));
        let report = extract_or_fallback(&extractor, "Help").await;
        assert!(report.is_extraction_failure());
        assert_eq!(report, ExtractedReport::extraction_failed());
    }

    #[test]
    fn model_reply_is_never_the_placeholder() {
        let report = parse_report_json(
            r#"{"urgency": 6, "injury_severity": "Serious", "summary": "Error: could not parse report", "fallback": true}"#,
        )
        .unwrap();
        assert_eq!(report.summary, "Error: could not parse report");
        assert!(!report.is_extraction_failure());
    }

    #[tokio::test]
    async fn fallback_on_unparseable_reply() {
        let extractor = LlmExtractor::new(ScriptedProvider::replying("no idea"));
        assert!(
            extract_or_fallback(&extractor, "Help")
                .await
                .is_extraction_failure()
        );
    }

    #[tokio::test]
    async fn unavailable_extractor_always_falls_back() {
        let extractor = UnavailableExtractor::new("no API key");
        assert!(matches!(
            extractor.extract("Help").await,
            Err(AiError::Config { .. })
        ));
        assert!(
            extract_or_fallback(&extractor, "Help")
                .await
                .is_extraction_failure()
        );
    }

    #[test]
    fn missing_key_yields_unavailable_extractor() {
        let (_, provider) = create_extractor(&AiConfig::default());
        assert!(provider.is_none());
    }
}
