//! Startup validation of the portal configuration.

use crate::config::AppConfig;
use colored::Colorize;
use std::net::SocketAddr;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent startup.
    pub errors: Vec<String>,
    /// Problems worth fixing that don't prevent startup.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints warnings and errors to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Checks a configuration before the server starts.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_server(config, &mut result);
        Self::validate_database(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_server(config: &AppConfig, result: &mut ValidationResult) {
        let server = &config.server;
        let address = format!("{}:{}", server.host, server.port);
        if address.parse::<SocketAddr>().is_err() {
            result.add_error(format!("Invalid bind address: {}", address));
        }

        if server.port == 0 {
            result.add_warning("Port 0 binds to a random free port");
        }

        if server.request_timeout_secs == 0 {
            result.add_error("server.request_timeout_secs must be greater than 0");
        }

        for origin in &server.cors_origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                result.add_error(format!(
                    "CORS origin '{}' must start with http:// or https://",
                    origin
                ));
            }
        }

        if server.cors_origins.is_empty() && server.host != "127.0.0.1" && server.host != "localhost"
        {
            result.add_warning(format!(
                "Listening on {} with CORS open to any origin. Set server.cors_origins to restrict it.",
                server.host
            ));
        }
    }

    fn validate_database(config: &AppConfig, result: &mut ValidationResult) {
        let database = &config.database;

        if !database.url.starts_with("sqlite:") {
            result.add_error(format!(
                "Unsupported database URL '{}'. Only sqlite: URLs are supported.",
                database.url
            ));
        } else if database.url.contains(":memory:") || database.url.contains("mode=memory") {
            result.add_warning("In-memory database: all data is lost when the server stops");
        }

        if database.max_connections == 0 {
            result.add_error("database.max_connections must be greater than 0");
        }
        if database.min_connections > database.max_connections {
            result.add_error(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                database.min_connections, database.max_connections
            ));
        }
    }

    fn validate_logging(config: &AppConfig, result: &mut ValidationResult) {
        if let Err(e) = config.logging.parsed_level() {
            result.add_error(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::validate(&AppConfig::default());
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_validation_result_operations() {
        let mut result = ValidationResult::new();
        assert!(!result.has_errors());

        result.add_error("broken");
        result.add_warning("odd");
        assert!(result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/lab".to_string();
        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("Only sqlite")));
    }

    #[test]
    fn test_memory_database_warns() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        let result = ConfigValidator::validate(&config);
        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_pool_bounds() {
        let mut config = AppConfig::default();
        config.database.min_connections = 5;
        config.database.max_connections = 2;
        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("min_connections")));
    }

    #[test]
    fn test_bad_host_and_timeout() {
        let mut config = AppConfig::default();
        config.server.host = "not a host".to_string();
        config.server.request_timeout_secs = 0;
        let result = ConfigValidator::validate(&config);
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
    }

    #[test]
    fn test_cors_origins() {
        let mut config = AppConfig::default();
        config.server.cors_origins = vec!["lab.example".to_string()];
        assert!(ConfigValidator::validate(&config).has_errors());

        config.server.host = "0.0.0.0".to_string();
        config.server.cors_origins = Vec::new();
        let result = ConfigValidator::validate(&config);
        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(ConfigValidator::validate(&config).has_errors());
    }
}
