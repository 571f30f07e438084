#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Priority scoring engine.
//!
//! Maps an [`ExtractedReport`] plus the original report text to a
//! priority score in `0..=100` and an ordered rationale. The computation
//! is staged and later stages may override earlier ones:
//!
//! 1. Direct threat: injury tier baseline vs. urgency contribution.
//! 2. Contextual bonuses: vulnerable groups, scale, critical resources.
//! 3. Quality check: a spam penalty for short, low-urgency, injury-free
//!    reports.
//! 4. Finalization: clamp to 100, then the critical-injury floor.
//!
//! The engine is a pure function with no I/O.

use crisis_triage_report_models::{ExtractedReport, InjurySeverity};
use serde::{Deserialize, Serialize};

/// Highest possible priority score.
pub const MAX_SCORE: u8 = 100;

/// Minimum score for any report with a critical injury.
pub const CRITICAL_FLOOR: u8 = 85;

/// Points per urgency level.
const URGENCY_WEIGHT: u32 = 5;

/// Urgency level at which a report is flagged as high urgency.
const HIGH_URGENCY_LEVEL: u8 = 8;

/// The high-urgency note is only added while the injury baseline is below this.
const HIGH_URGENCY_BASE_CEILING: u32 = 50;

/// Bonus per distinct vulnerable group.
const VULNERABILITY_BONUS: u32 = 15;

/// Points per affected person for the scale bonus.
const SCALE_WEIGHT: u32 = 2;

/// Cap on the scale bonus.
const SCALE_BONUS_CAP: u32 = 20;

/// Flat bonus when any critical resource is requested.
const CRITICAL_RESOURCE_BONUS: u32 = 5;

/// Resources that mark a report as needing heavy response.
pub const CRITICAL_RESOURCES: &[&str] = &["firefighters", "ambulance", "heavy machinery"];

/// Spam penalty applies at or below this urgency.
const SPAM_MAX_URGENCY: u8 = 2;

/// Spam penalty applies to messages shorter than this many characters.
const SPAM_MAX_MESSAGE_CHARS: usize = 20;

/// Points removed by the spam penalty.
const SPAM_PENALTY: u32 = 30;

/// Separator used when the rationale is rendered as a single string.
pub const RATIONALE_SEPARATOR: &str = " | ";

/// Rationale used when no scoring factor triggered.
pub const DEFAULT_RATIONALE: &str = "Standard assessment based on urgency.";

/// Outcome of scoring a single report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityAssessment {
    /// Final priority score, `0..=100`.
    pub priority_score: u8,
    /// Ordered factors that contributed to the score. Never empty.
    pub rationale: Vec<String>,
}

impl PriorityAssessment {
    /// Renders the rationale as a single line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.rationale.join(RATIONALE_SEPARATOR)
    }
}

/// Baseline score implied by an injury tier.
#[must_use]
pub const fn base_threat_score(severity: InjurySeverity) -> u32 {
    match severity {
        InjurySeverity::Critical => 80,
        InjurySeverity::Serious => 60,
        InjurySeverity::Minor => 20,
        InjurySeverity::None => 0,
    }
}

const fn injury_rationale(severity: InjurySeverity) -> Option<&'static str> {
    match severity {
        InjurySeverity::Critical => Some("Critical Injury / Fatality Reported"),
        InjurySeverity::Serious => Some("Serious Injuries Reported"),
        InjurySeverity::Minor => Some("Minor Injuries Reported"),
        InjurySeverity::None => None,
    }
}

/// Bonus for the number of people affected.
///
/// Zero for a single person, otherwise `2 * people` capped at 20.
#[must_use]
pub fn scale_bonus(people_affected: u32) -> u32 {
    if people_affected > 1 {
        people_affected
            .saturating_mul(SCALE_WEIGHT)
            .min(SCALE_BONUS_CAP)
    } else {
        0
    }
}

/// Returns `true` if any requested resource is one of [`CRITICAL_RESOURCES`].
#[must_use]
pub fn needs_critical_resources(needs: &[String]) -> bool {
    needs.iter().any(|need| {
        let need = need.trim();
        CRITICAL_RESOURCES
            .iter()
            .any(|critical| need.eq_ignore_ascii_case(critical))
    })
}

/// Returns `true` if the report looks like spam or a low-quality test
/// message.
#[must_use]
pub fn is_low_quality(report: &ExtractedReport, original_text: &str) -> bool {
    report.urgency <= SPAM_MAX_URGENCY
        && report.injury_severity == InjurySeverity::None
        && original_text.chars().count() < SPAM_MAX_MESSAGE_CHARS
}

/// Computes the priority score and rationale for a report.
#[must_use]
pub fn compute_priority(report: &ExtractedReport, original_text: &str) -> PriorityAssessment {
    let mut rationale = Vec::new();

    // Direct threat to life
    let base = base_threat_score(report.injury_severity);
    if let Some(entry) = injury_rationale(report.injury_severity) {
        rationale.push(entry.to_string());
    }

    let urgency_contribution = u32::from(report.urgency) * URGENCY_WEIGHT;
    let mut score = base.max(urgency_contribution);
    if report.urgency >= HIGH_URGENCY_LEVEL && base < HIGH_URGENCY_BASE_CEILING {
        rationale.push(format!("High Urgency (Level {})", report.urgency));
    }

    // Contextual modifiers
    let groups = report.distinct_vulnerable_groups();
    if !groups.is_empty() {
        let bonus = u32::try_from(groups.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(VULNERABILITY_BONUS);
        score = score.saturating_add(bonus);
        rationale.push(format!(
            "+{bonus} for Vulnerable Groups: {}",
            groups.join(", ")
        ));
    }

    let scale = scale_bonus(report.people_affected);
    if scale > 0 {
        score = score.saturating_add(scale);
        rationale.push(format!(
            "+{scale} for Scale ({} people)",
            report.people_affected
        ));
    }

    if needs_critical_resources(&report.resource_needs) {
        score = score.saturating_add(CRITICAL_RESOURCE_BONUS);
        rationale.push(format!(
            "+{CRITICAL_RESOURCE_BONUS} for Critical Resource Needs"
        ));
    }

    // Quality check runs after the bonuses so it can offset them
    if is_low_quality(report, original_text) {
        score = score.saturating_sub(SPAM_PENALTY);
        rationale.push("Penalty for low quality/spam report".to_string());
    }

    let mut final_score = u8::try_from(score.min(u32::from(MAX_SCORE))).unwrap_or(MAX_SCORE);

    if report.injury_severity == InjurySeverity::Critical && final_score < CRITICAL_FLOOR {
        final_score = CRITICAL_FLOOR;
        rationale.push("Score elevated to minimum for Critical Injury".to_string());
    }

    if rationale.is_empty() {
        rationale.push(DEFAULT_RATIONALE.to_string());
    }

    log::debug!(
        "Scored report '{}': {final_score} ({})",
        report.summary,
        rationale.join(RATIONALE_SEPARATOR)
    );

    PriorityAssessment {
        priority_score: final_score,
        rationale,
    }
}
