//! Whole-database export and restore.

use super::capability_repo::{fetch_all_capabilities, insert_capability};
use super::equipment_repo::{fetch_all_equipment, insert_equipment};
use super::io_repo::{fetch_all_ios, insert_io};
use super::location_repo::{fetch_all_locations, insert_location};
use super::request_repo::{fetch_all_requests, insert_request};
use super::sample_repo::{fetch_all_samples, insert_sample};
use super::test_method_repo::{fetch_all_test_methods, insert_test_method};
use super::user_repo::{fetch_all_users, insert_user};
use super::{DbError, DbPool};
use crate::models::{
    Capability, Equipment, Io, Location, Request, TestMethod, TestingSample, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Version written into every exported document.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// A full snapshot of every collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub capabilities: Vec<Capability>,
    pub locations: Vec<Location>,
    pub equipment: Vec<Equipment>,
    pub test_methods: Vec<TestMethod>,
    pub users: Vec<User>,
    pub ios: Vec<Io>,
    pub requests: Vec<Request>,
    pub testing_samples: Vec<TestingSample>,
}

/// Row counts per collection, reported after a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub capabilities: usize,
    pub locations: usize,
    pub equipment: usize,
    pub test_methods: usize,
    pub users: usize,
    pub ios: usize,
    pub requests: usize,
    pub testing_samples: usize,
}

impl From<&Backup> for RestoreSummary {
    fn from(backup: &Backup) -> Self {
        Self {
            capabilities: backup.capabilities.len(),
            locations: backup.locations.len(),
            equipment: backup.equipment.len(),
            test_methods: backup.test_methods.len(),
            users: backup.users.len(),
            ios: backup.ios.len(),
            requests: backup.requests.len(),
            testing_samples: backup.testing_samples.len(),
        }
    }
}

#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// Dumps every collection.
    async fn export(&self) -> Result<Backup, DbError>;

    /// Replaces every collection with the backup's content.
    ///
    /// Runs in one transaction: either the whole backup is loaded or the
    /// database is left as it was.
    async fn restore(&self, backup: &Backup) -> Result<RestoreSummary, DbError>;
}

pub struct SqliteBackupRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteBackupRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

// Children before parents.
const DELETE_ORDER: &[&str] = &[
    "testing_samples",
    "requests",
    "test_methods",
    "users",
    "equipment",
    "ios",
    "locations",
    "capabilities",
];

#[async_trait]
impl BackupRepository for SqliteBackupRepository {
    async fn export(&self) -> Result<Backup, DbError> {
        // A read transaction gives a consistent snapshot across tables.
        let mut tx = self.pool.begin().await?;

        let backup = Backup {
            format_version: BACKUP_FORMAT_VERSION,
            exported_at: Utc::now(),
            capabilities: fetch_all_capabilities(&mut tx).await?,
            locations: fetch_all_locations(&mut tx).await?,
            equipment: fetch_all_equipment(&mut tx).await?,
            test_methods: fetch_all_test_methods(&mut tx).await?,
            users: fetch_all_users(&mut tx).await?,
            ios: fetch_all_ios(&mut tx).await?,
            requests: fetch_all_requests(&mut tx).await?,
            testing_samples: fetch_all_samples(&mut tx).await?,
        };

        tx.commit().await?;
        Ok(backup)
    }

    #[instrument(skip_all, fields(format_version = backup.format_version))]
    async fn restore(&self, backup: &Backup) -> Result<RestoreSummary, DbError> {
        if backup.format_version != BACKUP_FORMAT_VERSION {
            return Err(DbError::Validation(format!(
                "Unsupported backup format version {} (expected {})",
                backup.format_version, BACKUP_FORMAT_VERSION
            )));
        }

        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;

        for table in DELETE_ORDER {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for capability in &backup.capabilities {
            insert_capability(&mut tx, capability).await?;
        }
        for location in &backup.locations {
            insert_location(&mut tx, location).await?;
        }
        for equipment in &backup.equipment {
            insert_equipment(&mut tx, equipment).await?;
        }
        for method in &backup.test_methods {
            insert_test_method(&mut tx, method).await?;
        }
        for user in &backup.users {
            insert_user(&mut tx, user).await?;
        }
        for io in &backup.ios {
            insert_io(&mut tx, io).await?;
        }
        for request in &backup.requests {
            insert_request(&mut tx, request).await?;
        }
        for sample in &backup.testing_samples {
            insert_sample(&mut tx, sample).await?;
        }

        tx.commit().await?;

        let summary = RestoreSummary::from(backup);
        info!(
            requests = summary.requests,
            samples = summary.testing_samples,
            "Backup restored"
        );
        Ok(summary)
    }
}

pub fn create_backup_repository(pool: &DbPool) -> Box<dyn BackupRepository> {
    Box::new(SqliteBackupRepository::new(pool.inner().clone()))
}
