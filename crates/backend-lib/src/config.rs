// ============================
// coedit-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "coedit.toml";

/// Prefix of environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "COEDIT_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where a backend reads from and writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem
    File,
    /// Remote endpoint over HTTP
    Http,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::File => f.write_str("file"),
            BackendKind::Http => f.write_str("http"),
        }
    }
}

/// Backend selection: kind plus file path, directory or URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::File,
            path: String::new(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Document storage backend
    pub storage: BackendSettings,
    /// Optional version sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<BackendSettings>,
    /// Idle timeout of a connection in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_ttl_secs: Option<u64>,
    /// Depth of each connection's outbound queue
    pub channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            storage: BackendSettings::default(),
            versions: None,
            conn_ttl_secs: None,
            channel_capacity: 32,
        }
    }
}

impl Settings {
    /// Layered sources: defaults, then the TOML file, then `COEDIT_*` variables
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path).extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        validate_backend("storage", &self.storage)?;

        if let Some(versions) = &self.versions {
            validate_backend("versions", versions)?;
        }

        if self.conn_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "conn_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Idle timeout, if configured
    pub fn conn_ttl(&self) -> Option<Duration> {
        self.conn_ttl_secs.map(Duration::from_secs)
    }
}

fn validate_backend(section: &str, backend: &BackendSettings) -> Result<(), ConfigError> {
    if backend.path.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.path must be set")));
    }

    if backend.kind == BackendKind::Http
        && !(backend.path.starts_with("http://") || backend.path.starts_with("https://"))
    {
        return Err(ConfigError::Invalid(format!(
            "{section}.path must be an http(s) URL, got '{}'",
            backend.path
        )));
    }

    Ok(())
}
