//! Database maintenance commands: migrate, backup and restore.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use lp_core::db::{
    create_backup_repository, create_pool_with_options, run_migrations, Backup, DbPool,
    RestoreSummary,
};

use crate::config::DatabaseConfig;

/// Opens the configured database and brings its schema up to date.
pub(super) async fn open_database(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = create_pool_with_options(&config.url, config.pool_options())
        .await
        .with_context(|| format!("Failed to open database {}", config.url))?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Applies pending migrations.
pub async fn run_migrate(config: &DatabaseConfig) -> Result<()> {
    println!("{} {}", "Migrating".cyan(), config.url);
    let pool = open_database(config).await?;
    pool.close().await;
    println!("  {} Schema is up to date", "✓".green());
    Ok(())
}

/// Exports every collection as JSON to `out`, or stdout when `None`.
pub async fn run_backup(config: &DatabaseConfig, out: Option<&Path>) -> Result<()> {
    let pool = open_database(config).await?;
    let backup = create_backup_repository(&pool)
        .export()
        .await
        .context("Failed to export database")?;
    pool.close().await;

    let json = serde_json::to_string_pretty(&backup)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write backup to {}", path.display()))?;
            info!(path = %path.display(), requests = backup.requests.len(), "Backup written");
            eprintln!(
                "{} {} ({} requests, {} samples)",
                "Backup written to".green(),
                path.display(),
                backup.requests.len(),
                backup.testing_samples.len()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    Ok(())
}

/// Parses a backup file. Accepts the bare document or the API envelope
/// (`{"success": true, "data": {...}}`).
pub fn read_backup(path: &Path) -> Result<Backup> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup file: {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Backup file is not valid JSON: {}", path.display()))?;

    if let Some(data) = value.get_mut("data") {
        value = data.take();
    }

    serde_json::from_value(value)
        .with_context(|| format!("Backup file has an unexpected shape: {}", path.display()))
}

/// Replaces the database content with the backup in `file`.
pub async fn run_restore(config: &DatabaseConfig, file: &Path, yes: bool) -> Result<()> {
    let backup = read_backup(file)?;

    if !yes {
        bail!(
            "Restoring replaces every record in {}. Re-run with --yes to confirm.",
            config.url
        );
    }

    let pool = open_database(config).await?;
    let summary = create_backup_repository(&pool)
        .restore(&backup)
        .await
        .context("Failed to restore backup")?;
    pool.close().await;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RestoreSummary) {
    println!("{}", "Backup restored".green().bold());
    println!("─────────────────────");
    println!("  Capabilities:    {}", summary.capabilities);
    println!("  Locations:       {}", summary.locations);
    println!("  Equipment:       {}", summary.equipment);
    println!("  Test methods:    {}", summary.test_methods);
    println!("  Users:           {}", summary.users);
    println!("  IOs:             {}", summary.ios);
    println!("  Requests:        {}", summary.requests);
    println!("  Testing samples: {}", summary.testing_samples);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &Path) -> DatabaseConfig {
        DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", dir.join("portal.db").display()),
            max_connections: 1,
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_backup_then_restore_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path());
        run_migrate(&config).await.unwrap();

        let out = dir.path().join("backup.json");
        run_backup(&config, Some(&out)).await.unwrap();

        let backup = read_backup(&out).unwrap();
        assert!(backup.capabilities.is_empty());

        run_restore(&config, &out, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path());
        run_migrate(&config).await.unwrap();

        let out = dir.path().join("backup.json");
        run_backup(&config, Some(&out)).await.unwrap();

        let err = run_restore(&config, &out, false).await.unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }

    #[test]
    fn test_read_backup_accepts_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("envelope.json");
        std::fs::write(
            &path,
            r#"{"success": true, "data": {
                "format_version": 1,
                "exported_at": "2024-10-01T08:00:00Z",
                "capabilities": [], "locations": [], "equipment": [],
                "test_methods": [], "users": [], "ios": [],
                "requests": [], "testing_samples": []
            }}"#,
        )
        .unwrap();

        let backup = read_backup(&path).unwrap();
        assert_eq!(backup.format_version, 1);
    }

    #[test]
    fn test_read_backup_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_backup(&path).is_err());
    }
}
