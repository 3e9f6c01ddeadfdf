//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::time::Duration;

use lp_api::{ApiServer, ApiServerConfig, AppState};

use super::data::open_database;
use crate::config::AppConfig;

/// Runs the API server until Ctrl+C or SIGTERM.
pub async fn run_server(config: &AppConfig) -> Result<()> {
    println!("{} Starting lab portal API server...", "[server]".cyan());

    println!("  {} Database: {}", "→".green(), config.database.url);
    let db_pool = open_database(&config.database).await?;
    println!("  {} Migrations complete", "✓".green());

    let state = AppState::new(db_pool);

    let bind_address: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let server_config = ApiServerConfig {
        bind_address,
        request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        enable_swagger: config.server.enable_swagger,
        cors_origins: config.server.cors_origins.clone(),
    };

    println!();
    println!("{}", "Lab Portal API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    println!("  {} {}", "Database:".cyan(), config.database.url);

    if config.server.enable_swagger {
        println!(
            "  {} http://{}/swagger-ui",
            "Swagger UI:".cyan(),
            bind_address
        );
    }

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET   /health                        - Health check");
    println!("  GET   /api/capabilities              - Capabilities (also locations, equipment,");
    println!("                                         test-methods, users, ios)");
    println!("  POST  /api/requests/ntr              - Submit a Normal Test Request");
    println!("  POST  /api/requests/asr              - Submit an Analysis Solution Request");
    println!("  POST  /api/requests/er               - Reserve equipment");
    println!("  PATCH /api/requests/:id/status       - Move a request through the workflow");
    println!("  PATCH /api/samples/:id/status        - Move a sample through the workflow");
    println!("  GET   /api/backup                    - Export all data");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}
