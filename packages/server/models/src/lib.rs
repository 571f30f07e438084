#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crisis triage server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the store's incident type to allow independent evolution of the
//! API contract.

use chrono::{DateTime, Utc};
use crisis_triage_incident_models::{Incident, IncidentStatus};
use crisis_triage_report_models::ExtractedReport;
use serde::{Deserialize, Serialize};

/// An incident as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Unique incident ID.
    pub id: i64,
    /// Original report text.
    pub message: String,
    /// Priority score, 0 to 100.
    pub priority_score: u8,
    /// Why the score came out the way it did.
    pub rationale: Vec<String>,
    /// Extracted report attributes.
    pub details: ExtractedReport,
    /// Lifecycle status (`Needs Dispatch`, `Acknowledged`,
    /// `Dispatched: <team>`).
    pub status: IncidentStatus,
    /// When the incident was created.
    pub created_at: DateTime<Utc>,
}

impl From<Incident> for ApiIncident {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            message: incident.message,
            priority_score: incident.priority_score,
            rationale: incident.rationale,
            details: incident.details,
            status: incident.status,
            created_at: incident.created_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Body of `POST /api/triage`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriageRequest {
    /// Raw report text.
    pub message: String,
}

/// Subset of a Telegram bot update that the webhook cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    /// Update sequence number.
    pub update_id: i64,
    /// The new message, if the update carries one.
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// The message text, if present and not blank.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// A Telegram message.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    /// Message text; absent for stickers, photos, etc.
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `POST /api/generate-appeal`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealRequest {
    /// Incidents to base the appeal on.
    #[serde(alias = "incident_ids")]
    pub incident_ids: Vec<i64>,
}

/// Response of `POST /api/generate-appeal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppealResponse {
    /// Generated appeal text.
    pub appeal: String,
}

/// Outcome label of a lifecycle transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionOutcome {
    /// The transition was applied.
    Success,
    /// The transition was refused.
    Failed,
}

/// Response of the acknowledge and dispatch endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    /// Whether the transition was applied.
    pub status: TransitionOutcome,
    /// The new status, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<IncidentStatus>,
    /// Why the transition was refused, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TransitionResponse {
    /// A successful transition to `new_status`.
    #[must_use]
    pub const fn success(new_status: IncidentStatus) -> Self {
        Self {
            status: TransitionOutcome::Success,
            new_status: Some(new_status),
            reason: None,
        }
    }

    /// A refused transition.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: TransitionOutcome::Failed,
            new_status: None,
            reason: Some(reason.into()),
        }
    }
}

/// Generic error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crisis_triage_incident_models::NewIncident;
    use crisis_triage_report_models::InjurySeverity;

    use super::*;

    #[test]
    fn api_incident_uses_camel_case_and_status_strings() {
        let incident = Incident::from_new(
            7,
            NewIncident {
                message: "Flooding".to_string(),
                priority_score: 64,
                rationale: vec!["Serious Injuries Reported".to_string()],
                details: ExtractedReport::new(6, InjurySeverity::Serious, "Flooding"),
            },
            Utc::now(),
        );

        let json = serde_json::to_value(ApiIncident::from(incident)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["priorityScore"], 64);
        assert_eq!(json["status"], "Needs Dispatch");
        assert_eq!(json["details"]["injury_severity"], "Serious");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn transition_responses() {
        let ok = serde_json::to_value(TransitionResponse::success(IncidentStatus::Dispatched {
            team: "Team Charlie (S&R)".to_string(),
        }))
        .unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"status": "success", "newStatus": "Dispatched: Team Charlie (S&R)"})
        );

        let failed =
            serde_json::to_value(TransitionResponse::failed("Incident must be acknowledged first."))
                .unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"status": "failed", "reason": "Incident must be acknowledged first."})
        );
    }

    #[test]
    fn telegram_update_text() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{"update_id": 1, "message": {"message_id": 5, "text": "Fire on 5th street"}}"#,
        )
        .unwrap();
        assert_eq!(update.text(), Some("Fire on 5th street"));

        let sticker: TelegramUpdate =
            serde_json::from_str(r#"{"update_id": 2, "message": {"message_id": 6}}"#).unwrap();
        assert!(sticker.text().is_none());

        let edited: TelegramUpdate =
            serde_json::from_str(r#"{"update_id": 3, "edited_message": {}}"#).unwrap();
        assert!(edited.text().is_none());
    }

    #[test]
    fn appeal_request_accepts_both_casings() {
        let camel: AppealRequest = serde_json::from_str(r#"{"incidentIds": [1, 2]}"#).unwrap();
        let snake: AppealRequest = serde_json::from_str(r#"{"incident_ids": [3]}"#).unwrap();
        assert_eq!(camel.incident_ids, vec![1, 2]);
        assert_eq!(snake.incident_ids, vec![3]);
    }
}
