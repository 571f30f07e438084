#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident storage and lifecycle transitions.
//!
//! Incidents live in an [`IncidentStore`]: either the in-process
//! [`memory::MemoryIncidentStore`] or the `SQLite`-backed
//! [`sqlite::SqliteIncidentStore`]. Stores never mutate status directly on
//! behalf of callers; every change goes through [`lifecycle::transition`],
//! which checks the precondition against the stored state and commits with
//! an atomic compare-and-set so racing transitions on the same incident
//! serialize.

pub mod dispatch;
pub mod lifecycle;
pub mod memory;
pub mod sqlite;

use crisis_triage_incident_models::{Incident, IncidentStatus, NewIncident};
use thiserror::Error;

/// Errors from incident storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed (e.g., creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization of incident details failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row could not be converted back into an [`Incident`].
    #[error("Corrupt incident row {id}: {message}")]
    CorruptRow {
        /// Incident id of the offending row.
        id: i64,
        /// Description of what went wrong.
        message: String,
    },
}

/// Persistent home of incident records.
///
/// Implementations must make [`IncidentStore::compare_and_set_status`]
/// atomic with respect to other calls on the same incident.
#[async_trait::async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persists a new incident in [`IncidentStatus::NeedsDispatch`] and
    /// returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn insert(&self, incident: NewIncident) -> Result<Incident, StoreError>;

    /// Loads one incident.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get(&self, id: i64) -> Result<Option<Incident>, StoreError>;

    /// Loads the incidents with the given ids, ignoring unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Incident>, StoreError>;

    /// Lists all incidents, highest priority first (ties by id).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn list_by_priority(&self) -> Result<Vec<Incident>, StoreError>;

    /// Sets the status of `id` to `next` only if it currently equals
    /// `expected`. Returns whether the write happened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &IncidentStatus,
        next: &IncidentStatus,
    ) -> Result<bool, StoreError>;
}

/// Sorts incidents highest priority first, then oldest id first.
pub(crate) fn sort_by_priority(incidents: &mut [Incident]) {
    incidents.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.id.cmp(&b.id))
    });
}
