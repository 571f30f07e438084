//! `SQLite`-backed incident store.
//!
//! Uses `switchy_database` for all database operations. Extracted details
//! and the scoring rationale are stored as JSON text columns; the status is
//! stored in its display form (`"Needs Dispatch"`, `"Dispatched: <team>"`).

use std::path::Path;

use crisis_triage_incident_models::{Incident, IncidentStatus, NewIncident};
use crisis_triage_report_models::ExtractedReport;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{IncidentStore, StoreError};

/// Default path for the incidents database.
pub const DEFAULT_DB_PATH: &str = "data/incidents.db";

const SELECT_COLUMNS: &str =
    "SELECT id, message, priority_score, rationale, details, status, created_at FROM incidents";

/// Incident store persisted in a `SQLite` database file.
pub struct SqliteIncidentStore {
    db: Box<dyn Database>,
}

impl SqliteIncidentStore {
    /// Opens (or creates) the incidents database at `path` and ensures the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be created or the schema
    /// DDL fails.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db =
            init_sqlite_rusqlite(Some(path)).map_err(|e| StoreError::Database(e.to_string()))?;

        Self::from_database(db).await
    }

    /// Wraps an existing connection, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the schema DDL fails.
    pub async fn from_database(db: Box<dyn Database>) -> Result<Self, StoreError> {
        ensure_schema(db.as_ref()).await?;
        Ok(Self { db })
    }
}

/// Creates the incidents table if it doesn't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), StoreError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS incidents (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            message        TEXT NOT NULL,
            priority_score INTEGER NOT NULL,
            rationale      TEXT NOT NULL,
            details        TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'Needs Dispatch',
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_incidents_priority
         ON incidents (priority_score DESC, id)",
    )
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(())
}

/// Converts a row selected with [`SELECT_COLUMNS`] into an [`Incident`].
fn row_to_incident(row: &Row) -> Result<Incident, StoreError> {
    let id: i64 = row
        .to_value("id")
        .map_err(|e| StoreError::Database(format!("Failed to read incident id: {e}")))?;
    let corrupt = |message: String| StoreError::CorruptRow { id, message };

    let message: String = row
        .to_value("message")
        .map_err(|e| corrupt(format!("message: {e}")))?;
    let priority_score: i64 = row
        .to_value("priority_score")
        .map_err(|e| corrupt(format!("priority_score: {e}")))?;
    let priority_score = u8::try_from(priority_score)
        .map_err(|_| corrupt(format!("priority_score {priority_score} out of range")))?;
    let rationale: String = row
        .to_value("rationale")
        .map_err(|e| corrupt(format!("rationale: {e}")))?;
    let details: String = row
        .to_value("details")
        .map_err(|e| corrupt(format!("details: {e}")))?;
    let status: String = row
        .to_value("status")
        .map_err(|e| corrupt(format!("status: {e}")))?;
    let created_at: String = row
        .to_value("created_at")
        .map_err(|e| corrupt(format!("created_at: {e}")))?;

    Ok(Incident {
        id,
        message,
        priority_score,
        rationale: serde_json::from_str(&rationale)?,
        details: serde_json::from_str::<ExtractedReport>(&details)?,
        status: status.parse().map_err(|e| corrupt(format!("{e}")))?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt(format!("created_at: {e}")))?
            .with_timezone(&chrono::Utc),
    })
}

#[async_trait::async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn insert(&self, incident: NewIncident) -> Result<Incident, StoreError> {
        let now = chrono::Utc::now();
        let now_str = now.to_rfc3339();

        let rows = self
            .db
            .query_raw_params(
                "INSERT INTO incidents
                     (message, priority_score, rationale, details, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
                &[
                    DatabaseValue::String(incident.message.clone()),
                    DatabaseValue::Int64(i64::from(incident.priority_score)),
                    DatabaseValue::String(serde_json::to_string(&incident.rationale)?),
                    DatabaseValue::String(serde_json::to_string(&incident.details)?),
                    DatabaseValue::String(IncidentStatus::NeedsDispatch.to_string()),
                    DatabaseValue::String(now_str.clone()),
                    DatabaseValue::String(now_str),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let id: i64 = rows
            .first()
            .and_then(|r| r.to_value("id").ok())
            .ok_or_else(|| StoreError::Database("Insert did not return an id".to_string()))?;

        log::debug!("Stored incident #{id}");

        Ok(Incident::from_new(id, incident, now))
    }

    async fn get(&self, id: i64) -> Result<Option<Incident>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("{SELECT_COLUMNS} WHERE id = ?"),
                &[DatabaseValue::Int64(id)],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.first().map(row_to_incident).transpose()
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Incident>, StoreError> {
        let mut incidents = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(incident) = self.get(id).await? {
                incidents.push(incident);
            }
        }
        Ok(incidents)
    }

    async fn list_by_priority(&self) -> Result<Vec<Incident>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("{SELECT_COLUMNS} ORDER BY priority_score DESC, id ASC"),
                &[],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(row_to_incident).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &IncidentStatus,
        next: &IncidentStatus,
    ) -> Result<bool, StoreError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE incidents SET status = ?, updated_at = ?
                 WHERE id = ? AND status = ?",
                &[
                    DatabaseValue::String(next.to_string()),
                    DatabaseValue::String(chrono::Utc::now().to_rfc3339()),
                    DatabaseValue::Int64(id),
                    DatabaseValue::String(expected.to_string()),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(updated > 0)
    }
}
