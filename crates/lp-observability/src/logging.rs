//! Logging infrastructure for the lab request portal.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events pass the default filter.
const PORTAL_TARGETS: &[&str] = &["lp_core", "lp_api", "lp_cli", "lp_observability"];

/// Errors raised while installing the global subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level name (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit one JSON object per event.
    pub json_format: bool,
    /// Log span open/close events.
    pub include_spans: bool,
    /// Include file and line.
    pub include_location: bool,
    pub include_thread_ids: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_spans: false,
            include_location: true,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose output for local work.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            include_spans: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// JSON output for log shipping.
    pub fn production() -> Self {
        Self {
            json_format: true,
            include_location: false,
            ..Self::default()
        }
    }

    /// Parses the configured level.
    pub fn parsed_level(&self) -> Result<Level, LoggingError> {
        Level::from_str(&self.level).map_err(|_| LoggingError::InvalidLevel(self.level.clone()))
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn default_directives(&self) -> Result<String, LoggingError> {
        let level = self.parsed_level()?;
        let mut directives: Vec<String> = PORTAL_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect();
        directives.push(format!("tower_http={}", level));
        directives.push("sqlx=warn".to_string());
        Ok(directives.join(","))
    }
}

/// Initializes logging with the default configuration.
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initializes logging. `RUST_LOG` overrides the configured level.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.default_directives()?),
    };

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

/// Creates a span scoped to one request record.
#[macro_export]
macro_rules! request_span {
    ($request_id:expr) => {
        tracing::info_span!("lab_request", request_id = %$request_id)
    };
    ($request_id:expr, $($field:tt)*) => {
        tracing::info_span!("lab_request", request_id = %$request_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.parsed_level().unwrap(), Level::INFO);
        assert!(!config.json_format);
    }

    #[test]
    fn test_presets() {
        assert!(LoggingConfig::production().json_format);
        assert_eq!(
            LoggingConfig::development().parsed_level().unwrap(),
            Level::DEBUG
        );
    }

    #[test]
    fn test_default_directives() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        let directives = config.default_directives().unwrap();
        assert!(directives.contains("lp_core=WARN"));
        assert!(directives.contains("lp_api=WARN"));
        assert!(directives.ends_with("sqlx=warn"));
    }

    #[test]
    fn test_invalid_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.default_directives(),
            Err(LoggingError::InvalidLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"json_format": true}"#).unwrap();
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }
}
