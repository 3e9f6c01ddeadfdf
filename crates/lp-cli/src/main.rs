//! Lab Portal CLI
//!
//! Runs the lab request portal API and maintains its database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;
mod validator;

use commands::{run_backup, run_migrate, run_restore, run_server};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "lab-portal")]
#[command(author = "Lab Portal Team")]
#[command(version)]
#[command(about = "Lab request portal: test requests, analysis requests and equipment reservations", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Database URL, overrides the config file
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Disable Swagger UI
        #[arg(long)]
        no_swagger: bool,

        /// Validate configuration and exit without starting the server
        #[arg(long)]
        validate_only: bool,
    },

    /// Create or upgrade the database schema
    Migrate,

    /// Export every record as JSON
    Backup {
        /// Output file; prints to stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Replace every record with the content of a backup file
    Restore {
        /// Backup file written by `backup` or `GET /api/backup`
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Confirm that existing data will be replaced
        #[arg(short, long)]
        yes: bool,
    },

    /// Validate configuration
    Validate,

    /// Show the effective configuration
    Config {
        /// Also write it to this file as YAML
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, config_path) = AppConfig::resolve(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    if let Err(e) = lp_observability::init_logging_with_config(&config.logging) {
        eprintln!("{}: {}", "Logging disabled".yellow(), e);
    }

    if cli.verbose {
        match &config_path {
            Some(path) => eprintln!("Using configuration from {}", path.display()),
            None => eprintln!("Using default configuration (no config file found)"),
        }
    }

    match cli.command {
        Commands::Serve {
            port,
            host,
            no_swagger,
            validate_only,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if no_swagger {
                config.server.enable_swagger = false;
            }
            cmd_serve(config, validate_only).await
        }
        Commands::Migrate => run_migrate(&config.database).await,
        Commands::Backup { out } => run_backup(&config.database, out.as_deref()).await,
        Commands::Restore { file, yes } => run_restore(&config.database, &file, yes).await,
        Commands::Validate => cmd_validate(&config),
        Commands::Config { write } => cmd_config(&config, write, cli.format),
    }
}

/// Global flags win over the config file.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(database) = &cli.database {
        config.database.url = database.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.format == OutputFormat::Json {
        config.logging.json_format = true;
    }
}

async fn cmd_serve(config: AppConfig, validate_only: bool) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Server startup aborted due to configuration errors. Fix the errors above and try again."
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    if validate_only {
        println!();
        println!(
            "{}",
            "Configuration is valid. Server can be started."
                .green()
                .bold()
        );
        return Ok(());
    }

    println!();
    run_server(&config).await
}

fn cmd_validate(config: &AppConfig) -> Result<()> {
    let validation_result = ConfigValidator::validate(config);
    validation_result.print();

    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Address:  {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.database.url);
    println!("  Logging:  {}", config.logging.level);

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

fn cmd_config(config: &AppConfig, write: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    if let Some(path) = write {
        config.save(&path)?;
        eprintln!("{} {}", "Configuration written to".green(), path.display());
    }

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(config).context("Failed to render configuration")?
        );
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        println!("Server:");
        println!("  Host:            {}", config.server.host);
        println!("  Port:            {}", config.server.port);
        println!("  Request timeout: {}s", config.server.request_timeout_secs);
        println!("  Swagger UI:      {}", config.server.enable_swagger);
        if config.server.cors_origins.is_empty() {
            println!("  CORS origins:    any");
        } else {
            println!("  CORS origins:    {}", config.server.cors_origins.join(", "));
        }
        println!("\nDatabase:");
        println!("  URL:             {}", config.database.url);
        println!(
            "  Connections:     {}..{}",
            config.database.min_connections, config.database.max_connections
        );
        println!("\nLogging:");
        println!("  Level:           {}", config.logging.level);
        println!("  JSON:            {}", config.logging.json_format);
    }

    Ok(())
}
