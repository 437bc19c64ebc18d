//! Tracing subscriber setup for hosts embedding the caching layer.

use tracing_subscriber::filter::{EnvFilter, ParseError};

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
}

/// Builds the filter: `RUST_LOG` if set, otherwise `config.filter`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the configured directive is
/// malformed.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.filter)?),
    }
}

/// Installs the global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the configured directive is
/// malformed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<bool, TelemetryError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
