#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report ingestion pipeline.
//!
//! [`TriageService`] ties the pieces together: a raw message is extracted
//! (falling back to a safe default on failure), scored, stored as a new
//! incident, and escalated when its score reaches
//! [`ESCALATION_THRESHOLD`](crisis_triage_notify::ESCALATION_THRESHOLD).
//! The HTTP server and the CLI both drive the system through this type.

use std::sync::Arc;

use crisis_triage_ai::AiError;
use crisis_triage_ai::appeal::generate_appeal;
use crisis_triage_ai::extractor::{Extractor, create_extractor, extract_or_fallback};
use crisis_triage_ai::providers::LlmProvider;
use crisis_triage_config::TriageConfig;
use crisis_triage_incident::dispatch::{BlankTeamError, FixedTeamSelector, TeamSelector};
use crisis_triage_incident::lifecycle::{self, LifecycleError};
use crisis_triage_incident::memory::MemoryIncidentStore;
use crisis_triage_incident::sqlite::SqliteIncidentStore;
use crisis_triage_incident::{IncidentStore, StoreError};
use crisis_triage_incident_models::{Incident, IncidentStatus, NewIncident};
use crisis_triage_notify::{
    EscalationAlert, EscalationNotifier, create_notifier, escalate, should_escalate,
};
use crisis_triage_report_models::ExtractedReport;
use crisis_triage_scoring::compute_priority;
use thiserror::Error;

/// Errors from the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The incident store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A lifecycle transition failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// None of the requested incidents exist.
    #[error("No incidents found for ids {ids:?}")]
    NoIncidents {
        /// The requested ids.
        ids: Vec<i64>,
    },

    /// No language model is configured.
    #[error("LLM provider not available")]
    AiUnavailable,

    /// The language model failed.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// The configured dispatch team is unusable.
    #[error(transparent)]
    Dispatch(#[from] BlankTeamError),
}

/// The triage pipeline and incident operations.
#[derive(Clone)]
pub struct TriageService {
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn IncidentStore>,
    notifier: Arc<dyn EscalationNotifier>,
    team_selector: Arc<dyn TeamSelector>,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl TriageService {
    /// Creates a service from its parts.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn IncidentStore>,
        notifier: Arc<dyn EscalationNotifier>,
        team_selector: Arc<dyn TeamSelector>,
    ) -> Self {
        Self {
            extractor,
            store,
            notifier,
            team_selector,
            provider: None,
        }
    }

    /// Sets the language model used for appeal generation.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Extracts, scores, stores, and (if needed) escalates a raw report.
    ///
    /// Returns `Ok(None)` without touching the store for a blank message.
    /// Extraction failures are not errors: the incident is stored with the
    /// fallback report.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] if the incident cannot be stored.
    pub async fn ingest_report(&self, message: &str) -> Result<Option<Incident>, IngestError> {
        if message.trim().is_empty() {
            log::debug!("Ignoring blank report");
            return Ok(None);
        }

        let report = extract_or_fallback(self.extractor.as_ref(), message).await;
        self.ingest_extracted(message, report).await
    }

    /// Scores, stores, and (if needed) escalates an already-extracted
    /// report.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] if the incident cannot be stored.
    pub async fn ingest_extracted(
        &self,
        message: &str,
        report: ExtractedReport,
    ) -> Result<Option<Incident>, IngestError> {
        if message.trim().is_empty() {
            return Ok(None);
        }

        let assessment = compute_priority(&report, message);
        log::info!(
            "Scored report {}/100: {}",
            assessment.priority_score,
            assessment.summary()
        );

        let incident = self
            .store
            .insert(NewIncident {
                message: message.to_string(),
                priority_score: assessment.priority_score,
                rationale: assessment.rationale,
                details: report,
            })
            .await?;

        log::info!(
            "Created incident #{} (score {})",
            incident.id,
            incident.priority_score
        );

        if should_escalate(incident.priority_score) {
            let alert = EscalationAlert {
                incident_id: incident.id,
                priority_score: incident.priority_score,
                message: incident.message.clone(),
                resource_needs: incident.details.resource_needs.clone(),
            };
            escalate(self.notifier.as_ref(), &alert).await;
        }

        Ok(Some(incident))
    }

    /// Ingests `message` on a background task. Failures are logged.
    pub fn spawn_ingest(&self, message: String) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.ingest_report(&message).await {
                log::error!("Background ingestion failed: {e}");
            }
        })
    }

    /// All incidents, highest priority first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] if the store fails.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>, IngestError> {
        Ok(self.store.list_by_priority().await?)
    }

    /// A single incident.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] if the store fails.
    pub async fn get_incident(&self, id: i64) -> Result<Option<Incident>, IngestError> {
        Ok(self.store.get(id).await?)
    }

    /// Acknowledges an incident awaiting dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Lifecycle`] if the incident doesn't exist or
    /// isn't awaiting dispatch.
    pub async fn acknowledge(&self, id: i64) -> Result<IncidentStatus, IngestError> {
        Ok(lifecycle::acknowledge(self.store.as_ref(), id, self.team_selector.as_ref()).await?)
    }

    /// Dispatches a team to an acknowledged incident.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Lifecycle`] if the incident doesn't exist,
    /// isn't acknowledged, or no team could be selected.
    pub async fn dispatch(&self, id: i64) -> Result<IncidentStatus, IngestError> {
        Ok(lifecycle::dispatch(self.store.as_ref(), id, self.team_selector.as_ref()).await?)
    }

    /// Writes a fundraising appeal from the selected incidents' messages.
    ///
    /// # Errors
    ///
    /// * [`IngestError::AiUnavailable`] if no language model is configured
    /// * [`IngestError::NoIncidents`] if none of `ids` exist
    /// * [`IngestError::Ai`] if generation fails
    pub async fn appeal(&self, ids: &[i64]) -> Result<String, IngestError> {
        let provider = self.provider.as_ref().ok_or(IngestError::AiUnavailable)?;

        let incidents = self.store.get_many(ids).await?;
        if incidents.is_empty() {
            return Err(IngestError::NoIncidents { ids: ids.to_vec() });
        }

        let messages: Vec<&str> = incidents.iter().map(|i| i.message.as_str()).collect();
        Ok(generate_appeal(provider.as_ref(), &messages).await?)
    }
}

/// Builds the service described by `config`: `SQLite` store when a
/// database path is set (in-memory otherwise), the configured language
/// model, Slack escalation when a webhook is set, and a fixed team
/// selector.
///
/// # Errors
///
/// * [`IngestError::Store`] if the database cannot be opened
/// * [`IngestError::Dispatch`] if the dispatch team is blank
pub async fn build_service(config: &TriageConfig) -> Result<TriageService, IngestError> {
    let team_selector = Arc::new(FixedTeamSelector::new(&config.dispatch.default_team)?);

    let store: Arc<dyn IncidentStore> = match &config.database.path {
        Some(path) => {
            log::info!("Using SQLite incident store at {}", path.display());
            Arc::new(SqliteIncidentStore::open(path).await?)
        }
        None => {
            log::warn!("No database path configured, incidents are kept in memory");
            Arc::new(MemoryIncidentStore::new())
        }
    };

    let (extractor, provider) = create_extractor(&config.ai);
    let notifier = create_notifier(&config.notify);

    let service = TriageService::new(extractor, store, notifier, team_selector);

    Ok(match provider {
        Some(provider) => service.with_provider(provider),
        None => service,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crisis_triage_ai::providers::CompletionRequest;
    use crisis_triage_incident_models::TransitionError;
    use crisis_triage_notify::NotifyError;
    use crisis_triage_report_models::{EXTRACTION_FAILED_SUMMARY, InjurySeverity};

    use super::*;

    struct StubExtractor {
        report: Option<ExtractedReport>,
    }

    #[async_trait::async_trait]
    impl Extractor for StubExtractor {
        async fn extract(&self, _text: &str) -> Result<ExtractedReport, AiError> {
            self.report.clone().ok_or_else(|| AiError::Provider {
                message: "model offline".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        alerts: Mutex<Vec<EscalationAlert>>,
    }

    #[async_trait::async_trait]
    impl EscalationNotifier for RecordingNotifier {
        async fn notify(&self, alert: &EscalationAlert) -> Result<(), NotifyError> {
            self.alerts.lock().unwrap().push(alert.clone());
            if self.fail {
                Err(NotifyError::Rejected {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct CannedProvider;

    #[async_trait::async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
            Ok(format!("Appeal: {}", request.messages[0].content))
        }
    }

    fn critical_report() -> ExtractedReport {
        ExtractedReport::new(9, InjurySeverity::Critical, "Building collapse")
            .with_vulnerable_individuals(["children"])
            .with_people_affected(12)
            .with_resource_needs(["heavy machinery", "ambulance"])
    }

    fn service(
        report: Option<ExtractedReport>,
        notifier: Arc<RecordingNotifier>,
    ) -> (TriageService, Arc<MemoryIncidentStore>) {
        let store = Arc::new(MemoryIncidentStore::new());
        let service = TriageService::new(
            Arc::new(StubExtractor { report }),
            store.clone(),
            notifier,
            Arc::new(FixedTeamSelector::default()),
        );
        (service, store)
    }

    #[tokio::test]
    async fn high_priority_report_is_stored_and_escalated() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(Some(critical_report()), notifier.clone());

        let incident = service
            .ingest_report("Building collapsed, kids trapped under rubble")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(incident.priority_score, 100);
        assert_eq!(incident.status, IncidentStatus::NeedsDispatch);
        assert!(!incident.rationale.is_empty());

        let alerts = notifier.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].incident_id, incident.id);
        assert_eq!(alerts[0].resource_needs, vec!["heavy machinery", "ambulance"]);
        drop(alerts);
    }

    #[tokio::test]
    async fn low_priority_report_is_not_escalated() {
        let notifier = Arc::new(RecordingNotifier::default());
        let report = ExtractedReport::new(3, InjurySeverity::Minor, "Scraped knee");
        let (service, _) = service(Some(report), notifier.clone());

        let incident = service
            .ingest_report("My neighbour scraped his knee on the fence")
            .await
            .unwrap()
            .unwrap();

        assert!(incident.priority_score < 75);
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_ingestion() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let (service, store) = service(Some(critical_report()), notifier.clone());

        let incident = service
            .ingest_report("Building collapsed, kids trapped under rubble")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notifier.alerts.lock().unwrap().len(), 1);
        assert!(store.get(incident.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blank_message_creates_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(Some(critical_report()), notifier);

        assert!(service.ingest_report("   \n").await.unwrap().is_none());
        assert!(service.ingest_report("").await.unwrap().is_none());
        assert!(service.list_incidents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_extraction_stores_fallback_report() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(None, notifier.clone());

        let incident = service
            .ingest_report("help please there is water everywhere in our street")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(incident.details.summary, EXTRACTION_FAILED_SUMMARY);
        assert!(incident.details.is_extraction_failure());
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lifecycle_through_service() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(Some(critical_report()), notifier);
        let incident = service.ingest_report("Collapse").await.unwrap().unwrap();

        let err = service.dispatch(incident.id).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Lifecycle(LifecycleError::Transition(
                TransitionError::NotAcknowledged { .. }
            ))
        ));

        assert_eq!(
            service.acknowledge(incident.id).await.unwrap(),
            IncidentStatus::Acknowledged
        );
        assert_eq!(
            service.dispatch(incident.id).await.unwrap().to_string(),
            "Dispatched: Team Charlie (S&R)"
        );

        assert!(matches!(
            service.acknowledge(999).await.unwrap_err(),
            IngestError::Lifecycle(LifecycleError::NotFound { id: 999 })
        ));
    }

    #[tokio::test]
    async fn spawned_ingest_completes_in_background() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(Some(critical_report()), notifier);

        service
            .spawn_ingest("Flood water rising fast".to_string())
            .await
            .unwrap();

        assert_eq!(service.list_incidents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn appeal_requires_provider_and_known_incidents() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (service, _) = service(Some(critical_report()), notifier);
        let first = service.ingest_report("Flooding in Riverside").await.unwrap().unwrap();
        let second = service.ingest_report("Family on roof").await.unwrap().unwrap();

        assert!(matches!(
            service.appeal(&[first.id]).await,
            Err(IngestError::AiUnavailable)
        ));

        let service = service.with_provider(Arc::new(CannedProvider));
        assert!(matches!(
            service.appeal(&[404]).await,
            Err(IngestError::NoIncidents { .. })
        ));

        let appeal = service.appeal(&[first.id, second.id]).await.unwrap();
        assert!(appeal.contains("Flooding in Riverside. Family on roof"));
    }

    #[tokio::test]
    async fn in_memory_service_from_default_config() {
        let service = build_service(&TriageConfig::default()).await.unwrap();
        assert!(matches!(
            service.appeal(&[1]).await,
            Err(IngestError::AiUnavailable)
        ));

        let incident = service
            .ingest_report("Tree fell on a car, driver seems fine")
            .await
            .unwrap()
            .unwrap();
        assert!(incident.details.is_extraction_failure());
    }

    #[tokio::test]
    async fn blank_dispatch_team_is_a_build_error() {
        let mut config = TriageConfig::default();
        config.dispatch.default_team = " ".to_string();
        assert!(matches!(
            build_service(&config).await,
            Err(IngestError::Dispatch(BlankTeamError))
        ));
    }
}
