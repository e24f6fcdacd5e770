//! Serving configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! `PENGUINS_*` environment variables:
//!
//! ```toml
//! bundle = "file:///srv/penguins/bundle"
//! load_timeout_secs = 30
//! log_filter = "info,penguins=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const BUNDLE_ENV: &str = "PENGUINS_BUNDLE";
pub const LOAD_TIMEOUT_ENV: &str = "PENGUINS_LOAD_TIMEOUT_SECS";
pub const LOG_ENV: &str = "PENGUINS_LOG";

const DEFAULT_BUNDLE: &str = "data";
const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILTER: &str = "info";

/// Errors that may occur while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// An environment override did not parse.
    #[error("Invalid value `{value}` for {var}: expected {expected}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("bundle locator is empty")]
    EmptyBundle,
    #[error("load timeout must be at least one second")]
    ZeroTimeout,
}

/// On-disk form; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    bundle: Option<String>,
    load_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Resolved serving configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    /// Bundle source locator (`file://<dir>` or a directory path).
    pub bundle: String,
    /// Upper bound on the initial bundle load.
    pub load_timeout: Duration,
    /// `EnvFilter` directives for logging.
    pub log_filter: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bundle: DEFAULT_BUNDLE.to_string(),
            load_timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServeConfig {
    /// Resolve from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(path, |var| std::env::var(var).ok())
    }

    /// Resolve from an optional file plus `env` as the variable lookup.
    pub fn resolve(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => ConfigFile::default(),
        };

        let mut config = ServeConfig::default();
        if let Some(bundle) = file.bundle {
            config.bundle = bundle;
        }
        if let Some(secs) = file.load_timeout_secs {
            config.load_timeout = Duration::from_secs(secs);
        }
        if let Some(filter) = file.log_filter {
            config.log_filter = filter;
        }

        if let Some(bundle) = env(BUNDLE_ENV) {
            config.bundle = bundle;
        }
        if let Some(raw) = env(LOAD_TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                var: LOAD_TIMEOUT_ENV,
                value: raw.clone(),
                expected: "a whole number of seconds",
            })?;
            config.load_timeout = Duration::from_secs(secs);
        }
        if let Some(filter) = env(LOG_ENV) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bundle.trim().is_empty() {
            return Err(ConfigError::EmptyBundle);
        }
        if self.load_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}
