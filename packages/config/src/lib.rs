#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the crisis triage services.
//!
//! Configuration is loaded once at startup into a [`TriageConfig`] and
//! passed explicitly to constructors. Sources, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables (`LLM_PROVIDER`, `GROQ_API_KEY`,
//!    `SLACK_WEBHOOK_URL`, `PORT`, ...)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`TriageConfig`].
    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// An environment variable has an unusable value.
    #[error("Invalid value for {name}: '{value}' ({message})")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        message: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Dotted path of the setting.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

/// Which language-model backend extracts reports.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AiProviderKind {
    /// Groq (`OpenAI`-compatible API).
    #[default]
    Groq,
    /// Novita.ai (`OpenAI`-compatible API).
    Novita,
    /// `OpenAI`.
    #[strum(to_string = "openai", serialize = "gpt")]
    #[serde(alias = "gpt")]
    OpenAi,
    /// Anthropic Claude.
    #[strum(to_string = "anthropic", serialize = "claude")]
    #[serde(alias = "claude")]
    Anthropic,
}

/// Language-model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// Backend used for extraction and appeal generation.
    pub provider: AiProviderKind,
    /// Model override; each backend has its own default.
    pub model: Option<String>,
    /// Endpoint override for `OpenAI`-compatible backends (self-hosted
    /// servers, proxies).
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Groq API key.
    pub groq_api_key: Option<String>,
    /// Novita.ai API key.
    pub novita_api_key: Option<String>,
    /// `OpenAI` API key.
    pub openai_api_key: Option<String>,
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::default(),
            model: None,
            base_url: None,
            timeout_secs: 20,
            groq_api_key: None,
            novita_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
        }
    }
}

impl AiConfig {
    /// Returns the API key configured for the selected provider.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            AiProviderKind::Groq => self.groq_api_key.as_deref(),
            AiProviderKind::Novita => self.novita_api_key.as_deref(),
            AiProviderKind::OpenAi => self.openai_api_key.as_deref(),
            AiProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
        }
        .filter(|key| !key.trim().is_empty())
    }
}

/// Escalation notification settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// Slack incoming-webhook URL. Escalations are skipped when unset.
    pub slack_webhook_url: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `SQLite` file for incidents. Incidents are kept in memory when unset.
    pub path: Option<PathBuf>,
}

/// Dispatch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Team sent by the fixed team selector.
    pub default_team: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_team: "Team Charlie (S&R)".to_string(),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriageConfig {
    /// Language-model settings.
    pub ai: AiConfig,
    /// Escalation settings.
    pub notify: NotifyConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Persistence settings.
    pub database: DatabaseConfig,
    /// Dispatch settings.
    pub dispatch: DispatchConfig,
}

impl TriageConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// environment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// environment variable has an invalid value, or the merged settings
    /// fail [`TriageConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Normalizes the merged settings and rejects unusable ones. The
    /// dispatch team is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `dispatch.default_team` is
    /// blank.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let team = self.dispatch.default_team.trim();
        if team.is_empty() {
            return Err(ConfigError::Invalid {
                field: "dispatch.default_team",
                message: "team name must not be blank".to_string(),
            });
        }
        self.dispatch.default_team = team.to_string();
        Ok(())
    }

    /// Reads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies overrides from environment-style lookups. Empty values are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a variable has an invalid
    /// value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("LLM_PROVIDER") {
            self.ai.provider = provider.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "LLM_PROVIDER",
                value: provider.clone(),
                message: "expected groq, novita, openai, or anthropic".to_string(),
            })?;
        }
        if let Some(model) = get("AI_MODEL") {
            self.ai.model = Some(model);
        }
        if let Some(base_url) = get("AI_BASE_URL") {
            self.ai.base_url = Some(base_url);
        }
        if let Some(timeout) = get("AI_TIMEOUT_SECS") {
            self.ai.timeout_secs = parse_env("AI_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(key) = get("GROQ_API_KEY") {
            self.ai.groq_api_key = Some(key);
        }
        if let Some(key) = get("NOVITA_API_KEY") {
            self.ai.novita_api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(key);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = Some(key);
        }
        if let Some(url) = get("SLACK_WEBHOOK_URL") {
            self.notify.slack_webhook_url = Some(url);
        }
        if let Some(addr) = get("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = get("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(path) = get("DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(team) = get("DISPATCH_TEAM") {
            self.dispatch.default_team = team;
        }

        Ok(())
    }
}

fn parse_env<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
        message: e.to_string(),
    })
}
