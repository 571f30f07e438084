#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for crisis triage.
//!
//! Accepts reports from the web dashboard (`POST /api/triage`) and from a
//! Telegram bot webhook, lists incidents by priority, drives the incident
//! lifecycle (acknowledge, dispatch), and generates fundraising appeals.

mod handlers;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use crisis_triage_config::TriageConfig;
use crisis_triage_ingest::{TriageService, build_service};

/// Shared application state.
pub struct AppState {
    /// The triage pipeline and incident operations.
    pub service: TriageService,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/incidents", web::get().to(handlers::incidents))
            .route("/incidents/{id}", web::get().to(handlers::incident))
            .route(
                "/incidents/{id}/acknowledge",
                web::post().to(handlers::acknowledge),
            )
            .route(
                "/incidents/{id}/dispatch",
                web::post().to(handlers::dispatch),
            )
            .route("/triage", web::post().to(handlers::triage))
            .route("/telegram-webhook", web::post().to(handlers::telegram_webhook))
            .route("/generate-appeal", web::post().to(handlers::generate_appeal)),
    );
}

/// Starts the crisis triage API server.
///
/// Builds the triage service from `config` (opening the incident database
/// if one is configured) and starts the Actix-Web HTTP server. This is a
/// regular async function; the caller is responsible for providing the
/// async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the service cannot be built, or
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: &TriageConfig) -> std::io::Result<()> {
    let service = build_service(config)
        .await
        .map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState { service });

    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
