//! Incident lifecycle transitions against a store.
//!
//! A transition reads the incident, checks the precondition on the state it
//! actually observed, and commits with
//! [`IncidentStore::compare_and_set_status`]. If another writer changed the
//! status in between, the write is refused and the transition starts over
//! from the fresh state. Because states only move forward, a retry either
//! succeeds or fails its precondition; it cannot loop.

use crisis_triage_incident_models::{IncidentAction, IncidentStatus, TransitionError};
use thiserror::Error;

use crate::dispatch::TeamSelector;
use crate::{IncidentStore, StoreError};

/// Upper bound on read/compare-and-set rounds for a single transition.
const MAX_ATTEMPTS: u32 = 3;

/// Errors from applying a lifecycle transition.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No incident with this id exists.
    #[error("Incident #{id} not found")]
    NotFound {
        /// The requested id.
        id: i64,
    },

    /// The action is not allowed from the incident's current state.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The incident kept changing underneath the transition.
    #[error("Incident #{id} changed concurrently while applying {action}")]
    Contended {
        /// The incident id.
        id: i64,
        /// The action that could not be committed.
        action: IncidentAction,
    },
}

/// Applies `action` to incident `id` and returns the new status.
///
/// # Errors
///
/// * [`LifecycleError::NotFound`] if the incident doesn't exist
/// * [`LifecycleError::Transition`] if the precondition is not met; the
///   stored status is unchanged
/// * [`LifecycleError::Store`] if the store fails
pub async fn transition(
    store: &dyn IncidentStore,
    id: i64,
    action: IncidentAction,
    team_selector: &dyn TeamSelector,
) -> Result<IncidentStatus, LifecycleError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let incident = store.get(id).await?.ok_or(LifecycleError::NotFound { id })?;

        let next = incident.status.apply(action, || {
            team_selector.select_team(incident.details.latitude, incident.details.longitude)
        })?;

        if store
            .compare_and_set_status(id, &incident.status, &next)
            .await?
        {
            log::info!(
                "Incident #{id}: {} -> {next} ({action})",
                incident.status
            );
            return Ok(next);
        }

        log::debug!("Incident #{id} changed during {action} (attempt {attempt}), retrying");
    }

    Err(LifecycleError::Contended { id, action })
}

/// Moves an incident from `NeedsDispatch` to `Acknowledged`.
///
/// # Errors
///
/// See [`transition`].
pub async fn acknowledge(
    store: &dyn IncidentStore,
    id: i64,
    team_selector: &dyn TeamSelector,
) -> Result<IncidentStatus, LifecycleError> {
    transition(store, id, IncidentAction::Acknowledge, team_selector).await
}

/// Dispatches an acknowledged incident to the team chosen by
/// `team_selector`.
///
/// # Errors
///
/// See [`transition`].
pub async fn dispatch(
    store: &dyn IncidentStore,
    id: i64,
    team_selector: &dyn TeamSelector,
) -> Result<IncidentStatus, LifecycleError> {
    transition(store, id, IncidentAction::Dispatch, team_selector).await
}
