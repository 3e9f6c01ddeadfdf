//! # lp-observability
//!
//! Structured logging for the lab request portal, built on `tracing`.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig, LoggingError};
