//! In-process incident store.
//!
//! Used when no database path is configured and in tests. Records are lost
//! when the process exits.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crisis_triage_incident_models::{Incident, IncidentStatus, NewIncident};

use crate::{IncidentStore, StoreError, sort_by_priority};

#[derive(Default)]
struct Inner {
    next_id: i64,
    incidents: BTreeMap<i64, Incident>,
}

/// Incident store backed by a mutex-guarded map.
///
/// Every operation holds the lock for its whole duration, which makes
/// compare-and-set trivially atomic.
#[derive(Default)]
pub struct MemoryIncidentStore {
    inner: Mutex<Inner>,
}

impl MemoryIncidentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn insert(&self, incident: NewIncident) -> Result<Incident, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let incident = Incident::from_new(id, incident, chrono::Utc::now());
        inner.incidents.insert(id, incident.clone());
        Ok(incident)
    }

    async fn get(&self, id: i64) -> Result<Option<Incident>, StoreError> {
        Ok(self.lock().incidents.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Incident>, StoreError> {
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.incidents.get(id).cloned())
            .collect())
    }

    async fn list_by_priority(&self) -> Result<Vec<Incident>, StoreError> {
        let mut incidents: Vec<Incident> = self.lock().incidents.values().cloned().collect();
        sort_by_priority(&mut incidents);
        Ok(incidents)
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &IncidentStatus,
        next: &IncidentStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.incidents.get_mut(&id) {
            Some(incident) if &incident.status == expected => {
                incident.status = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
