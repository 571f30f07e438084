#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Structured emergency report contract.
//!
//! Every extractor backend (LLM provider, test double, CLI file input)
//! produces an [`ExtractedReport`]. Deserialization is lenient: the model
//! on the other side of the contract may omit fields, send `null`, use a
//! different casing for the injury tier, or send numbers as floats. Every
//! field still ends up present with a sensible default, so downstream
//! scoring never has to deal with a partial report.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Lowest urgency level an extractor may report.
pub const MIN_URGENCY: u8 = 1;

/// Highest urgency level an extractor may report.
pub const MAX_URGENCY: u8 = 10;

/// Summary stored when the extractor could not produce a report at all.
pub const EXTRACTION_FAILED_SUMMARY: &str = "Error: could not parse report";

/// Summary used when the extractor returned an empty one.
const MISSING_SUMMARY: &str = "No summary provided";

/// Errors from interpreting report fields.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The injury tier label is not one of the known tiers.
    #[error("Invalid injury severity '{label}' (expected None, Minor, Serious or Critical)")]
    InvalidSeverity {
        /// The rejected label.
        label: String,
    },
}

/// Worst injury level described in a report.
///
/// Ordered so that `Critical` compares greatest.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum InjurySeverity {
    /// No injuries described.
    #[default]
    #[serde(alias = "none", alias = "NONE")]
    None,
    /// Cuts, bruises, anything not needing urgent care.
    #[serde(alias = "minor", alias = "MINOR")]
    Minor,
    /// Broken bones and similar injuries needing treatment.
    #[serde(alias = "serious", alias = "SERIOUS")]
    Serious,
    /// Life-threatening injuries or a death mentioned.
    #[serde(alias = "critical", alias = "CRITICAL")]
    Critical,
}

impl InjurySeverity {
    /// Returns all tiers from least to most severe.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::None, Self::Minor, Self::Serious, Self::Critical]
    }

    /// Parses a tier label, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidSeverity`] for an unknown label.
    pub fn from_label(label: &str) -> Result<Self, ReportError> {
        label
            .trim()
            .parse()
            .map_err(|_| ReportError::InvalidSeverity {
                label: label.to_string(),
            })
    }

    /// Parses a tier label, falling back to [`InjurySeverity::None`] for
    /// anything unrecognized.
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        Self::from_label(label).unwrap_or_else(|e| {
            log::warn!("{e}, treating as None");
            Self::None
        })
    }
}

/// Structured attributes extracted from a free-text emergency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReport {
    /// Immediacy of the threat to life, 1 (none) to 10 (mortal danger now).
    #[serde(default = "default_urgency", deserialize_with = "de_urgency")]
    pub urgency: u8,
    /// Vulnerable groups mentioned (e.g. `children`, `elderly`).
    #[serde(default, deserialize_with = "de_labels")]
    pub vulnerable_individuals: Vec<String>,
    /// Worst injury tier described.
    #[serde(default, deserialize_with = "de_severity")]
    pub injury_severity: InjurySeverity,
    /// Best estimate of the number of people at risk, at least 1.
    #[serde(default = "default_people", deserialize_with = "de_people")]
    pub people_affected: u32,
    /// Estimated latitude, when identifiable.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Estimated longitude, when identifiable.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// One-sentence summary of the incident.
    #[serde(default = "default_summary", deserialize_with = "de_summary")]
    pub summary: String,
    /// Resources requested (e.g. `ambulance`, `boat`).
    #[serde(default, deserialize_with = "de_labels")]
    pub resource_needs: Vec<String>,
    /// Set only on the placeholder substituted when extraction failed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback: bool,
}

impl ExtractedReport {
    /// Creates a report with the given urgency and severity and every other
    /// field at its default.
    #[must_use]
    pub fn new(urgency: u8, injury_severity: InjurySeverity, summary: impl Into<String>) -> Self {
        Self {
            urgency: urgency.clamp(MIN_URGENCY, MAX_URGENCY),
            vulnerable_individuals: Vec::new(),
            injury_severity,
            people_affected: 1,
            latitude: None,
            longitude: None,
            summary: normalize_summary(summary.into()),
            resource_needs: Vec::new(),
            fallback: false,
        }
    }

    /// The safe default substituted when extraction fails for any reason.
    #[must_use]
    pub fn extraction_failed() -> Self {
        Self {
            fallback: true,
            ..Self::new(MIN_URGENCY, InjurySeverity::None, EXTRACTION_FAILED_SUMMARY)
        }
    }

    /// Returns `true` if this is the extraction-failure placeholder. A
    /// real report whose summary happens to match the placeholder text is
    /// not one.
    #[must_use]
    pub const fn is_extraction_failure(&self) -> bool {
        self.fallback
    }

    /// Sets the vulnerable groups, dropping blanks and duplicates.
    #[must_use]
    pub fn with_vulnerable_individuals<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vulnerable_individuals = normalize_labels(groups.into_iter().map(Into::into));
        self
    }

    /// Sets the number of people affected (raised to at least 1).
    #[must_use]
    pub fn with_people_affected(mut self, people: u32) -> Self {
        self.people_affected = people.max(1);
        self
    }

    /// Sets the requested resources, dropping blanks and duplicates.
    #[must_use]
    pub fn with_resource_needs<I, S>(mut self, needs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_needs = normalize_labels(needs.into_iter().map(Into::into));
        self
    }

    /// Sets the estimated coordinates.
    #[must_use]
    pub const fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Returns the distinct vulnerable groups in first-seen order.
    ///
    /// Labels compare case-insensitively after trimming, so `"Children"`
    /// and `" children"` count once.
    #[must_use]
    pub fn distinct_vulnerable_groups(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.vulnerable_individuals
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty() && seen.insert(g.to_lowercase()))
            .collect()
    }
}

impl Default for ExtractedReport {
    fn default() -> Self {
        Self::new(MIN_URGENCY, InjurySeverity::None, MISSING_SUMMARY)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

fn normalize_labels(labels: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    labels
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && seen.insert(l.to_lowercase()))
        .collect()
}

fn normalize_summary(summary: String) -> String {
    let trimmed = summary.trim();
    if trimmed.is_empty() {
        MISSING_SUMMARY.to_string()
    } else if trimmed.len() == summary.len() {
        summary
    } else {
        trimmed.to_string()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_urgency(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_URGENCY;
    }
    raw.round()
        .clamp(f64::from(MIN_URGENCY), f64::from(MAX_URGENCY)) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_people(raw: f64) -> u32 {
    if raw.is_nan() || raw < 1.0 {
        return 1;
    }
    raw.round().min(f64::from(u32::MAX)) as u32
}

const fn default_urgency() -> u8 {
    MIN_URGENCY
}

const fn default_people() -> u32 {
    1
}

fn default_summary() -> String {
    MISSING_SUMMARY.to_string()
}

fn de_urgency<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.map_or(MIN_URGENCY, clamp_urgency))
}

fn de_people<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.map_or(1, clamp_people))
}

fn de_severity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<InjurySeverity, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map_or(InjurySeverity::None, |s| InjurySeverity::parse_lenient(&s)))
}

fn de_labels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(normalize_labels(raw.into_iter().flatten()))
}

fn de_summary<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map_or_else(default_summary, normalize_summary))
}
