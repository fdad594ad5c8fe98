//! Logging initialization
//!
//! Logs always go to stderr: with the stdio transport, stdout of a server
//! process is the protocol channel, and applications embedding this client
//! often use their own stdout for the same purpose.
//!
//! ```rust,no_run
//! use mcplink_client::LoggingConfig;
//!
//! LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `mcplink_client=debug,warn`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub structured: bool,
    /// Colorize human-readable output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            ansi: false,
        }
    }
}

impl LoggingConfig {
    /// Errors only, plain text
    pub fn quiet() -> Self {
        Self {
            level: "error".to_string(),
            ..Self::default()
        }
    }

    /// JSON lines at `info`, for log collectors
    pub fn structured() -> Self {
        Self {
            structured: true,
            ..Self::default()
        }
    }

    /// Filter built from the configured level alone
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if `level` is not a valid
    /// filter directive.
    pub fn level_filter(&self) -> io::Result<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid log level '{}': {e}", self.level),
            )
        })
    }

    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `RUST_LOG` is unset and the configured level does not parse
    /// - A global subscriber is already installed
    pub fn init(&self) -> io::Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => self.level_filter()?,
        };
        let subscriber = tracing_subscriber::registry().with(filter);

        if self.structured {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        } else {
            subscriber
                .with(fmt::layer().with_ansi(self.ansi).with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::default().level, "info");
        assert_eq!(LoggingConfig::quiet().level, "error");
        assert!(LoggingConfig::structured().structured);
        assert!(!LoggingConfig::default().ansi);
    }

    #[test]
    fn test_level_filter() {
        assert!(LoggingConfig::default().level_filter().is_ok());

        let config = LoggingConfig {
            level: "mcplink_client=debug,warn".to_string(),
            ..LoggingConfig::default()
        };
        assert!(config.level_filter().is_ok());

        let config = LoggingConfig {
            level: "mcplink_client=verbose".to_string(),
            ..LoggingConfig::default()
        };
        let err = config.level_filter().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
