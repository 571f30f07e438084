#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident records and the dispatch lifecycle.
//!
//! An incident is created in [`IncidentStatus::NeedsDispatch`], may be
//! acknowledged once, and may then be dispatched to a team. Dispatched
//! incidents are terminal. The transition rules live here as pure
//! functions on [`IncidentStatus`]; persistence and per-record
//! serialization are handled by the incident store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use crisis_triage_report_models::ExtractedReport;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

const NEEDS_DISPATCH: &str = "Needs Dispatch";
const ACKNOWLEDGED: &str = "Acknowledged";
const DISPATCHED_PREFIX: &str = "Dispatched:";

/// Lifecycle state of an incident.
///
/// Serialized as its display string (`"Needs Dispatch"`, `"Acknowledged"`,
/// `"Dispatched: <team>"`).
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum IncidentStatus {
    /// Newly ingested and waiting for a coordinator.
    #[default]
    NeedsDispatch,
    /// A coordinator has seen the incident.
    Acknowledged,
    /// A team has been sent. Terminal.
    Dispatched {
        /// Name of the dispatched team.
        team: String,
    },
}

impl IncidentStatus {
    /// Checks whether `action` is allowed from this state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] naming the violated precondition.
    pub fn check(&self, action: IncidentAction) -> Result<(), TransitionError> {
        match (action, self) {
            (IncidentAction::Acknowledge, Self::NeedsDispatch)
            | (IncidentAction::Dispatch, Self::Acknowledged) => Ok(()),
            (IncidentAction::Acknowledge, current) => Err(TransitionError::NotAwaitingDispatch {
                current: current.clone(),
            }),
            (IncidentAction::Dispatch, current) => Err(TransitionError::NotAcknowledged {
                current: current.clone(),
            }),
        }
    }

    /// Computes the state reached by applying `action`.
    ///
    /// `select_team` is only called for a dispatch whose precondition
    /// holds. The team name is trimmed so the new state reads back
    /// unchanged from its display form.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the action is not allowed from this
    /// state (no team is selected in that case), or if the selected team
    /// name is blank.
    pub fn apply<F>(&self, action: IncidentAction, select_team: F) -> Result<Self, TransitionError>
    where
        F: FnOnce() -> String,
    {
        self.check(action)?;
        Ok(match action {
            IncidentAction::Acknowledge => Self::Acknowledged,
            IncidentAction::Dispatch => {
                let team = select_team();
                let trimmed = team.trim();
                if trimmed.is_empty() {
                    return Err(TransitionError::BlankTeam);
                }
                Self::Dispatched {
                    team: trimmed.to_string(),
                }
            }
        })
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsDispatch => f.write_str(NEEDS_DISPATCH),
            Self::Acknowledged => f.write_str(ACKNOWLEDGED),
            Self::Dispatched { team } => write!(f, "{DISPATCHED_PREFIX} {team}"),
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            NEEDS_DISPATCH => Ok(Self::NeedsDispatch),
            ACKNOWLEDGED => Ok(Self::Acknowledged),
            _ => s
                .strip_prefix(DISPATCHED_PREFIX)
                .map(str::trim)
                .filter(|team| !team.is_empty())
                .map(|team| Self::Dispatched {
                    team: team.to_string(),
                })
                .ok_or_else(|| InvalidStatusError {
                    value: s.to_string(),
                }),
        }
    }
}

impl From<IncidentStatus> for String {
    fn from(status: IncidentStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for IncidentStatus {
    type Error = InvalidStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when a stored status string is not a known state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid incident status '{value}'")]
pub struct InvalidStatusError {
    /// The unrecognized status string.
    pub value: String,
}

/// An explicit lifecycle operation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentAction {
    /// `NeedsDispatch` -> `Acknowledged`.
    Acknowledge,
    /// `Acknowledged` -> `Dispatched`.
    Dispatch,
}

/// A lifecycle precondition was not met. No state was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Acknowledge was attempted on an incident not awaiting dispatch.
    #[error("Incident must be awaiting dispatch to be acknowledged (currently '{current}').")]
    NotAwaitingDispatch {
        /// State the incident was in.
        current: IncidentStatus,
    },
    /// Dispatch was attempted before the incident was acknowledged.
    #[error("Incident must be acknowledged first (currently '{current}').")]
    NotAcknowledged {
        /// State the incident was in.
        current: IncidentStatus,
    },
    /// The team selector returned a blank team name.
    #[error("No team available to dispatch.")]
    BlankTeam,
}

/// A stored incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Store-assigned identifier.
    pub id: i64,
    /// Original report text.
    pub message: String,
    /// Priority score computed at creation, `0..=100`.
    pub priority_score: u8,
    /// Ordered scoring rationale.
    pub rationale: Vec<String>,
    /// Structured attributes extracted from the message.
    pub details: ExtractedReport,
    /// Current lifecycle state.
    pub status: IncidentStatus,
    /// When the incident was ingested.
    pub created_at: DateTime<Utc>,
}

impl Incident {
    /// Builds the stored form of a freshly created incident.
    #[must_use]
    pub fn from_new(id: i64, new: NewIncident, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            message: new.message,
            priority_score: new.priority_score,
            rationale: new.rationale,
            details: new.details,
            status: IncidentStatus::NeedsDispatch,
            created_at,
        }
    }
}

/// Everything needed to create an incident. The store assigns the id,
/// timestamp and initial status.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    /// Original report text.
    pub message: String,
    /// Priority score, `0..=100`.
    pub priority_score: u8,
    /// Ordered scoring rationale.
    pub rationale: Vec<String>,
    /// Structured attributes extracted from the message.
    pub details: ExtractedReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> String {
        "Team Alpha (Medical)".to_string()
    }

    #[test]
    fn new_incidents_need_dispatch() {
        assert_eq!(IncidentStatus::default(), IncidentStatus::NeedsDispatch);
    }

    #[test]
    fn acknowledge_then_dispatch() {
        let acked = IncidentStatus::NeedsDispatch
            .apply(IncidentAction::Acknowledge, team)
            .unwrap();
        assert_eq!(acked, IncidentStatus::Acknowledged);

        let dispatched = acked.apply(IncidentAction::Dispatch, team).unwrap();
        assert_eq!(
            dispatched,
            IncidentStatus::Dispatched {
                team: "Team Alpha (Medical)".to_string()
            }
        );
    }

    #[test]
    fn dispatch_requires_acknowledgement() {
        let err = IncidentStatus::NeedsDispatch
            .apply(IncidentAction::Dispatch, || {
                panic!("team must not be selected when the precondition fails")
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAcknowledged {
                current: IncidentStatus::NeedsDispatch
            }
        );
        assert!(err.to_string().contains("must be acknowledged first"));
    }

    #[test]
    fn acknowledge_is_not_repeatable() {
        let err = IncidentStatus::Acknowledged
            .apply(IncidentAction::Acknowledge, team)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAwaitingDispatch {
                current: IncidentStatus::Acknowledged
            }
        );
    }

    #[test]
    fn dispatched_is_terminal() {
        let dispatched = IncidentStatus::Dispatched { team: team() };
        assert!(dispatched.check(IncidentAction::Acknowledge).is_err());
        assert!(dispatched.check(IncidentAction::Dispatch).is_err());
    }

    #[test]
    fn blank_team_is_refused() {
        for blank in ["", "   ", "\t\n"] {
            let err = IncidentStatus::Acknowledged
                .apply(IncidentAction::Dispatch, || blank.to_string())
                .unwrap_err();
            assert_eq!(err, TransitionError::BlankTeam);
        }
    }

    #[test]
    fn dispatched_status_reads_back_unchanged() {
        for team in ["Team X", " Team X ", "Team Charlie (S&R)\n"] {
            let dispatched = IncidentStatus::Acknowledged
                .apply(IncidentAction::Dispatch, || team.to_string())
                .unwrap();
            let reparsed: IncidentStatus = dispatched.to_string().parse().unwrap();
            assert_eq!(reparsed, dispatched);
            assert_eq!(
                dispatched,
                IncidentStatus::Dispatched {
                    team: team.trim().to_string()
                }
            );
        }
    }

    #[test]
    fn status_display_and_parse() {
        let cases = [
            (IncidentStatus::NeedsDispatch, "Needs Dispatch"),
            (IncidentStatus::Acknowledged, "Acknowledged"),
            (
                IncidentStatus::Dispatched {
                    team: "Team Charlie (S&R)".to_string(),
                },
                "Dispatched: Team Charlie (S&R)",
            ),
        ];
        for (status, text) in cases {
            assert_eq!(status.to_string(), text);
            assert_eq!(text.parse::<IncidentStatus>().unwrap(), status);
        }

        assert!("Dispatched:".parse::<IncidentStatus>().is_err());
        assert!("Closed".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_string() {
        let status = IncidentStatus::Dispatched {
            team: "Team Bravo (Logistics)".to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#""Dispatched: Team Bravo (Logistics)""#);
        let back: IncidentStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn action_names() {
        assert_eq!(IncidentAction::Acknowledge.as_ref(), "acknowledge");
        assert_eq!("dispatch".parse::<IncidentAction>().unwrap(), IncidentAction::Dispatch);
    }
}
