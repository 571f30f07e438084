//! HTTP handler functions for the crisis triage API.

use actix_web::{HttpResponse, web};
use crisis_triage_incident::lifecycle::LifecycleError;
use crisis_triage_incident_models::{IncidentAction, IncidentStatus};
use crisis_triage_ingest::IngestError;
use crisis_triage_server_models::{
    ApiError, ApiHealth, ApiIncident, AppealRequest, AppealResponse, TelegramUpdate,
    TransitionResponse, TriageRequest,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/incidents`
///
/// All incidents, highest priority first.
pub async fn incidents(state: web::Data<AppState>) -> HttpResponse {
    match state.service.list_incidents().await {
        Ok(incidents) => {
            let api_incidents: Vec<ApiIncident> =
                incidents.into_iter().map(ApiIncident::from).collect();
            HttpResponse::Ok().json(api_incidents)
        }
        Err(e) => {
            log::error!("Failed to list incidents: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to list incidents"))
        }
    }
}

/// `GET /api/incidents/{id}`
pub async fn incident(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    match state.service.get_incident(id).await {
        Ok(Some(incident)) => HttpResponse::Ok().json(ApiIncident::from(incident)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiError::new(format!("Incident #{id} not found")))
        }
        Err(e) => {
            log::error!("Failed to load incident #{id}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to load incident"))
        }
    }
}

/// `POST /api/triage`
///
/// Triages a report submitted from the web form and returns the created
/// incident.
pub async fn triage(state: web::Data<AppState>, body: web::Json<TriageRequest>) -> HttpResponse {
    match state.service.ingest_report(&body.message).await {
        Ok(Some(incident)) => HttpResponse::Ok().json(ApiIncident::from(incident)),
        Ok(None) => HttpResponse::BadRequest().json(ApiError::new("Message must not be empty")),
        Err(e) => {
            log::error!("Failed to triage report: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to triage report"))
        }
    }
}

/// `POST /api/telegram-webhook`
///
/// Receives Telegram bot updates. Text messages are triaged on a
/// background task so Telegram gets its acknowledgement immediately.
pub async fn telegram_webhook(
    state: web::Data<AppState>,
    body: web::Json<TelegramUpdate>,
) -> HttpResponse {
    if let Some(text) = body.text() {
        log::info!("Telegram update {}: queueing report", body.update_id);
        drop(state.service.spawn_ingest(text.to_string()));
    }

    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// `POST /api/incidents/{id}/acknowledge`
pub async fn acknowledge(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    let result = state.service.acknowledge(id).await;
    transition_response(id, IncidentAction::Acknowledge, result)
}

/// `POST /api/incidents/{id}/dispatch`
pub async fn dispatch(state: web::Data<AppState>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    let result = state.service.dispatch(id).await;
    transition_response(id, IncidentAction::Dispatch, result)
}

fn transition_response(
    id: i64,
    action: IncidentAction,
    result: Result<IncidentStatus, IngestError>,
) -> HttpResponse {
    match result {
        Ok(status) => HttpResponse::Ok().json(TransitionResponse::success(status)),
        Err(IngestError::Lifecycle(LifecycleError::NotFound { .. })) => {
            HttpResponse::NotFound().json(ApiError::new(format!("Incident #{id} not found")))
        }
        Err(IngestError::Lifecycle(
            e @ (LifecycleError::Transition(_) | LifecycleError::Contended { .. }),
        )) => {
            log::info!("Refused {action} on incident #{id}: {e}");
            HttpResponse::Conflict().json(TransitionResponse::failed(e.to_string()))
        }
        Err(e) => {
            log::error!("Failed to {action} incident #{id}: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new(format!("Failed to {action} incident")))
        }
    }
}

/// `POST /api/generate-appeal`
///
/// Writes a social-media fundraising appeal from the selected incidents.
pub async fn generate_appeal(
    state: web::Data<AppState>,
    body: web::Json<AppealRequest>,
) -> HttpResponse {
    match state.service.appeal(&body.incident_ids).await {
        Ok(appeal) => HttpResponse::Ok().json(AppealResponse { appeal }),
        Err(IngestError::NoIncidents { .. }) => {
            HttpResponse::NotFound().json(ApiError::new("No incidents selected."))
        }
        Err(IngestError::AiUnavailable) => {
            HttpResponse::ServiceUnavailable().json(ApiError::new("LLM client not available."))
        }
        Err(e) => {
            log::error!("Failed to generate appeal: {e}");
            HttpResponse::BadGateway().json(ApiError::new(e.to_string()))
        }
    }
}
