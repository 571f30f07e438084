//! Fundraising appeal generation from selected incident reports.

use crate::AiError;
use crate::providers::{CompletionRequest, LlmProvider};

/// Sampling temperature for appeals.
const APPEAL_TEMPERATURE: f32 = 0.7;

/// Builds the appeal prompt from the incident messages.
fn appeal_prompt(reports: &[&str]) -> String {
    format!(
        "Based on these real crisis reports: '{}', write a short, compelling \
         fundraising appeal for social media.",
        reports.join(". ")
    )
}

/// Asks `provider` for a short social-media fundraising appeal grounded in
/// `reports`.
///
/// # Errors
///
/// Returns [`AiError::EmptyInput`] if `reports` has no non-blank entry, or
/// the provider's error if the completion fails.
pub async fn generate_appeal(
    provider: &dyn LlmProvider,
    reports: &[&str],
) -> Result<String, AiError> {
    let reports: Vec<&str> = reports
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();

    if reports.is_empty() {
        return Err(AiError::EmptyInput);
    }

    let request =
        CompletionRequest::new(appeal_prompt(&reports)).with_temperature(APPEAL_TEMPERATURE);

    log::info!(
        "Generating appeal from {} report(s) with {}",
        reports.len(),
        provider.name()
    );

    let appeal = provider.complete(&request).await?;
    Ok(appeal.trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct EchoProvider {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
            let prompt = request.messages[0].content.clone();
            self.prompts.lock().unwrap().push(prompt);
            assert!((request.temperature - APPEAL_TEMPERATURE).abs() < f32::EPSILON);
            Ok("  Help us reach them today.\n".to_string())
        }
    }

    #[tokio::test]
    async fn joins_reports_into_prompt() {
        let provider = EchoProvider::default();
        let appeal = generate_appeal(
            &provider,
            &["Flooding in Riverside", "  ", "Family trapped on roof"],
        )
        .await
        .unwrap();

        assert_eq!(appeal, "Help us reach them today.");
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("'Flooding in Riverside. Family trapped on roof'"));
        assert!(prompts[0].contains("fundraising appeal"));
        drop(prompts);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_calling_provider() {
        let provider = EchoProvider::default();
        assert!(matches!(
            generate_appeal(&provider, &[]).await,
            Err(AiError::EmptyInput)
        ));
        assert!(matches!(
            generate_appeal(&provider, &[" "]).await,
            Err(AiError::EmptyInput)
        ));
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}
