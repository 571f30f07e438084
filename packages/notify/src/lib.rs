#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Escalation notifications for high-priority incidents.
//!
//! Incidents scoring at or above [`ESCALATION_THRESHOLD`] are pushed to a
//! human-facing channel as soon as they are stored. Delivery is best
//! effort: [`escalate`] logs failures and never surfaces them to the
//! ingestion path.

use std::sync::Arc;
use std::time::Duration;

use crisis_triage_config::NotifyConfig;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Minimum priority score that triggers an escalation.
pub const ESCALATION_THRESHOLD: u8 = 75;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The webhook request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-success status.
    #[error("Webhook rejected notification (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Returns whether an incident with this score must be escalated.
#[must_use]
pub const fn should_escalate(priority_score: u8) -> bool {
    priority_score >= ESCALATION_THRESHOLD
}

/// What an escalation tells the responders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationAlert {
    /// Stored incident id.
    pub incident_id: i64,
    /// Priority score, 0 to 100.
    pub priority_score: u8,
    /// The original report text.
    pub message: String,
    /// Resources requested in the report.
    pub resource_needs: Vec<String>,
}

/// Delivers escalation alerts to responders.
#[async_trait::async_trait]
pub trait EscalationNotifier: Send + Sync {
    /// Sends `alert`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails.
    async fn notify(&self, alert: &EscalationAlert) -> Result<(), NotifyError>;
}

/// Posts alerts to a Slack incoming webhook as Block Kit messages.
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Creates a notifier posting to `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()?,
        })
    }

    /// Builds the Block Kit payload for `alert`.
    #[must_use]
    pub fn payload(alert: &EscalationAlert) -> serde_json::Value {
        let needs = if alert.resource_needs.is_empty() {
            "Not specified".to_string()
        } else {
            alert.resource_needs.join(", ")
        };

        json!({
            "blocks": [
                {
                    "type": "header",
                    "text": {
                        "type": "plain_text",
                        "text": format!("🚨 High-Priority Incident #{}", alert.incident_id),
                        "emoji": true
                    }
                },
                {
                    "type": "section",
                    "fields": [
                        {
                            "type": "mrkdwn",
                            "text": format!("*Priority Score:*\n*{}/100*", alert.priority_score)
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Resource Needs:*\n{needs}")
                        }
                    ]
                },
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!("*Original Report:*\n```{}```", alert.message)
                    }
                },
                { "type": "divider" }
            ]
        })
    }
}

#[async_trait::async_trait]
impl EscalationNotifier for SlackNotifier {
    async fn notify(&self, alert: &EscalationAlert) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Notifier used when no channel is configured. Logs and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait::async_trait]
impl EscalationNotifier for DisabledNotifier {
    async fn notify(&self, alert: &EscalationAlert) -> Result<(), NotifyError> {
        log::warn!(
            "SLACK_WEBHOOK_URL not configured, skipping escalation for incident #{}",
            alert.incident_id
        );
        Ok(())
    }
}

/// Creates the notifier for `config`, falling back to [`DisabledNotifier`]
/// when no webhook is configured or the client cannot be built.
#[must_use]
pub fn create_notifier(config: &NotifyConfig) -> Arc<dyn EscalationNotifier> {
    let Some(url) = config
        .slack_webhook_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    else {
        log::info!("Escalation notifications disabled (no Slack webhook configured)");
        return Arc::new(DisabledNotifier);
    };

    match SlackNotifier::new(url) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            log::error!("Failed to create Slack notifier, escalations disabled: {e}");
            Arc::new(DisabledNotifier)
        }
    }
}

/// Sends `alert` through `notifier`, logging the outcome. Never fails.
pub async fn escalate(notifier: &dyn EscalationNotifier, alert: &EscalationAlert) {
    match notifier.notify(alert).await {
        Ok(()) => log::info!(
            "Escalated incident #{} (score {})",
            alert.incident_id,
            alert.priority_score
        ),
        Err(e) => log::error!(
            "Failed to escalate incident #{}: {e}",
            alert.incident_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn alert(needs: &[&str]) -> EscalationAlert {
        EscalationAlert {
            incident_id: 42,
            priority_score: 90,
            message: "Building collapsed, people trapped".to_string(),
            resource_needs: needs.iter().map(ToString::to_string).collect(),
        }
    }

    struct FailingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EscalationNotifier for FailingNotifier {
        async fn notify(&self, _alert: &EscalationAlert) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Rejected {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(!should_escalate(74));
        assert!(should_escalate(75));
        assert!(should_escalate(100));
    }

    #[test]
    fn slack_payload_layout() {
        let payload = SlackNotifier::payload(&alert(&["ambulance", "heavy machinery"]));
        let blocks = payload["blocks"].as_array().unwrap();

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[0]["text"]["text"], "🚨 High-Priority Incident #42");
        assert_eq!(blocks[1]["fields"][0]["text"], "*Priority Score:*\n*90/100*");
        assert_eq!(
            blocks[1]["fields"][1]["text"],
            "*Resource Needs:*\nambulance, heavy machinery"
        );
        assert_eq!(
            blocks[2]["text"]["text"],
            "*Original Report:*\n```Building collapsed, people trapped```"
        );
        assert_eq!(blocks[3]["type"], "divider");
    }

    #[test]
    fn slack_payload_without_needs() {
        let payload = SlackNotifier::payload(&alert(&[]));
        assert_eq!(
            payload["blocks"][1]["fields"][1]["text"],
            "*Resource Needs:*\nNot specified"
        );
    }

    #[tokio::test]
    async fn blank_webhook_means_disabled() {
        let config = NotifyConfig {
            slack_webhook_url: Some("   ".to_string()),
        };
        assert!(create_notifier(&config).notify(&alert(&[])).await.is_ok());
        assert!(
            create_notifier(&NotifyConfig::default())
                .notify(&alert(&[]))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn disabled_notifier_succeeds() {
        assert!(DisabledNotifier.notify(&alert(&[])).await.is_ok());
    }

    #[tokio::test]
    async fn escalate_swallows_failures() {
        let notifier = FailingNotifier {
            calls: AtomicUsize::new(0),
        };
        escalate(&notifier, &alert(&[])).await;
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }
}
