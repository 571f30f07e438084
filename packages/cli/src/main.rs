#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for crisis triage.
//!
//! Runs the API server or operates on the incident database directly:
//! triage a report, list incidents, move an incident through its
//! lifecycle, or score a pre-extracted report file without any network
//! access.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crisis_triage_config::TriageConfig;
use crisis_triage_incident::sqlite::DEFAULT_DB_PATH;
use crisis_triage_incident_models::Incident;
use crisis_triage_ingest::{IngestError, TriageService, build_service};
use crisis_triage_report_models::ExtractedReport;
use crisis_triage_scoring::{RATIONALE_SEPARATOR, compute_priority};

#[derive(Parser)]
#[command(name = "crisis_triage", about = "Emergency report triage")]
struct Cli {
    /// Path to a TOML config file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Extract, score, and store a report
    Triage {
        /// Report text
        message: String,
    },
    /// Score a pre-extracted report (JSON file) without storing it
    Score {
        /// JSON file holding the extracted report
        #[arg(long)]
        report: PathBuf,
        /// Original report text, used for the low-quality check
        message: String,
    },
    /// List incidents, highest priority first
    List,
    /// Acknowledge an incident awaiting dispatch
    Acknowledge {
        /// Incident id
        id: i64,
    },
    /// Dispatch a team to an acknowledged incident
    Dispatch {
        /// Incident id
        id: i64,
    },
    /// Write a fundraising appeal from the given incidents
    Appeal {
        /// Incident ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = TriageConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(crisis_triage_server::run_server(&config))
            })
            .await??;
        }
        Commands::Score { report, message } => {
            let contents = std::fs::read_to_string(&report)?;
            let report: ExtractedReport = serde_json::from_str(&contents)?;
            let assessment = compute_priority(&report, &message);
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Commands::Triage { message } => {
            let service = open_service(config).await?;
            match service.ingest_report(&message).await? {
                Some(incident) => print_incident(&incident),
                None => log::warn!("Empty report, nothing stored"),
            }
        }
        Commands::List => {
            let service = open_service(config).await?;
            let incidents = service.list_incidents().await?;
            if incidents.is_empty() {
                println!("No incidents.");
            }
            for incident in &incidents {
                print_incident(incident);
            }
        }
        Commands::Acknowledge { id } => {
            let service = open_service(config).await?;
            let status = service.acknowledge(id).await?;
            println!("Incident #{id}: {status}");
        }
        Commands::Dispatch { id } => {
            let service = open_service(config).await?;
            let status = service.dispatch(id).await?;
            println!("Incident #{id}: {status}");
        }
        Commands::Appeal { ids } => {
            let service = open_service(config).await?;
            println!("{}", service.appeal(&ids).await?);
        }
    }

    Ok(())
}

/// Builds the service for one-shot commands, which always persist to
/// `SQLite` ([`DEFAULT_DB_PATH`] unless configured).
async fn open_service(mut config: TriageConfig) -> Result<TriageService, IngestError> {
    if config.database.path.is_none() {
        config.database.path = Some(PathBuf::from(DEFAULT_DB_PATH));
    }
    build_service(&config).await
}

fn print_incident(incident: &Incident) {
    println!(
        "#{:<5} {:>3}/100  {:<32} {}",
        incident.id,
        incident.priority_score,
        incident.status.to_string(),
        incident.message
    );
    println!("       {}", incident.rationale.join(RATIONALE_SEPARATOR));
}
