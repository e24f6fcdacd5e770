//! Tracing subscriber setup for the command-line tools.
//!
//! Log lines go to stderr so stdout stays free for command output.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The filter directive string did not parse.
    #[error("Invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
    /// Another global subscriber was already installed.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}

/// Install a stderr `fmt` subscriber filtered by `filter` (`EnvFilter` syntax).
///
/// `RUST_LOG`, when set, takes precedence over `filter`. Subsequent calls are
/// no-ops.
pub fn init(filter: &str) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = build_env_filter(filter)?;
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let subscriber = Registry::default().with(env_filter).with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = INSTALLED.set(());

    tracing::debug!(filter, "logging initialized");
    Ok(())
}

fn build_env_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(from_env) => Ok(from_env),
        Err(_) => EnvFilter::try_new(filter).map_err(|source| LoggingError::Filter {
            filter: filter.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directive_filters() {
        assert!(build_env_filter("info,penguins=debug").is_ok());
    }

    #[test]
    fn rejects_garbage_filters() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(
            build_env_filter("penguins=loudest"),
            Err(LoggingError::Filter { .. })
        ));
    }
}
