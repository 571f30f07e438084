#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone crisis triage API server.
//!
//! Reads an optional config file path from `CRISIS_TRIAGE_CONFIG`; every
//! setting can also come from the environment.

use std::path::PathBuf;

use crisis_triage_config::TriageConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config_path = std::env::var_os("CRISIS_TRIAGE_CONFIG").map(PathBuf::from);
    let config = TriageConfig::load(config_path.as_deref()).map_err(std::io::Error::other)?;

    crisis_triage_server::run_server(&config).await
}
