//! Testing sample repository.
//!
//! Sample status changes roll up into the parent request inside the same
//! transaction, so a request never disagrees with its samples.

use super::convert;
use super::request_repo::{fetch_request, set_request_status};
use super::{DbError, DbPool};
use crate::models::{SampleFilter, SampleStatus, TestingSample};
use crate::workflow::{apply_sample_status, rollup_request_status};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// Repository trait for testing samples.
#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Gets a sample by ID.
    async fn get(&self, id: Uuid) -> Result<Option<TestingSample>, DbError>;

    /// Lists the samples of one request in sample-code order.
    async fn list_for_request(&self, request_id: Uuid) -> Result<Vec<TestingSample>, DbError>;

    /// Lists samples matching the filter.
    async fn list(&self, filter: &SampleFilter) -> Result<Vec<TestingSample>, DbError>;

    /// Moves a sample to `status` and rolls the change up into its request.
    ///
    /// `remarks`, when given, replaces the sample's remarks.
    async fn update_status(
        &self,
        id: Uuid,
        status: SampleStatus,
        remarks: Option<String>,
    ) -> Result<TestingSample, DbError>;
}

const SELECT_SAMPLE: &str = "SELECT id, sample_code, request_id, test_method_id, name, sample_type, description, status, remarks, received_at, completed_at, created_at, updated_at FROM testing_samples";

/// SQLite implementation of SampleRepository.
pub struct SqliteSampleRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteSampleRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SampleRepository for SqliteSampleRepository {
    async fn get(&self, id: Uuid) -> Result<Option<TestingSample>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_sample(&mut conn, id).await
    }

    async fn list_for_request(&self, request_id: Uuid) -> Result<Vec<TestingSample>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_samples_for_request(&mut conn, request_id).await
    }

    async fn list(&self, filter: &SampleFilter) -> Result<Vec<TestingSample>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_SAMPLE);
        let mut params: Vec<String> = Vec::new();

        if let Some(request_id) = filter.request_id {
            query.push_str(" AND request_id = ?");
            params.push(request_id.to_string());
        }

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            params.push(status.as_db_str().to_string());
        }

        if let Some(test_method_id) = filter.test_method_id {
            query.push_str(" AND test_method_id = ?");
            params.push(test_method_id.to_string());
        }

        query.push_str(" ORDER BY sample_code ASC");

        let mut sqlx_query = sqlx::query_as::<_, SampleRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip_all, fields(sample_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: Uuid,
        status: SampleStatus,
        remarks: Option<String>,
    ) -> Result<TestingSample, DbError> {
        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;
        let now = Utc::now();

        let mut sample = fetch_sample(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("TestingSample", id))?;

        apply_sample_status(&mut sample, status, now)?;
        if let Some(remarks) = remarks {
            sample.remarks = Some(remarks);
            sample.updated_at = now;
        }
        update_sample(&mut tx, &sample).await?;

        let request = fetch_request(&mut tx, sample.request_id)
            .await?
            .ok_or_else(|| DbError::not_found("Request", sample.request_id))?;
        let siblings: Vec<SampleStatus> = fetch_samples_for_request(&mut tx, request.id)
            .await?
            .iter()
            .map(|s| s.status)
            .collect();

        let rolled_up = rollup_request_status(request.status, &siblings);
        if rolled_up != request.status {
            set_request_status(&mut tx, request.id, rolled_up, now).await?;
            info!(
                request_number = %request.request_number,
                from = %request.status,
                to = %rolled_up,
                "Request status rolled up from samples"
            );
        }

        tx.commit().await?;
        Ok(sample)
    }
}

/// Factory function to create the sample repository.
pub fn create_sample_repository(pool: &DbPool) -> Box<dyn SampleRepository> {
    Box::new(SqliteSampleRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_sample(
    conn: &mut SqliteConnection,
    sample: &TestingSample,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO testing_samples (id, sample_code, request_id, test_method_id, name, sample_type,
                                     description, status, remarks, received_at, completed_at,
                                     created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(sample.id.to_string())
    .bind(&sample.sample_code)
    .bind(sample.request_id.to_string())
    .bind(sample.test_method_id.map(|id| id.to_string()))
    .bind(&sample.name)
    .bind(&sample.sample_type)
    .bind(&sample.description)
    .bind(sample.status.as_db_str())
    .bind(&sample.remarks)
    .bind(sample.received_at.map(|t| t.to_rfc3339()))
    .bind(sample.completed_at.map(|t| t.to_rfc3339()))
    .bind(sample.created_at.to_rfc3339())
    .bind(sample.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes the mutable columns of a sample back.
pub(crate) async fn update_sample(
    conn: &mut SqliteConnection,
    sample: &TestingSample,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE testing_samples
        SET status = ?, remarks = ?, received_at = ?, completed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(sample.status.as_db_str())
    .bind(&sample.remarks)
    .bind(sample.received_at.map(|t| t.to_rfc3339()))
    .bind(sample.completed_at.map(|t| t.to_rfc3339()))
    .bind(sample.updated_at.to_rfc3339())
    .bind(sample.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_sample(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<TestingSample>, DbError> {
    let row: Option<SampleRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_SAMPLE))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_samples_for_request(
    conn: &mut SqliteConnection,
    request_id: Uuid,
) -> Result<Vec<TestingSample>, DbError> {
    let rows: Vec<SampleRow> = sqlx::query_as(&format!(
        "{} WHERE request_id = ? ORDER BY sample_code ASC",
        SELECT_SAMPLE
    ))
    .bind(request_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) async fn fetch_all_samples(
    conn: &mut SqliteConnection,
) -> Result<Vec<TestingSample>, DbError> {
    let rows: Vec<SampleRow> = sqlx::query_as(&format!("{} ORDER BY sample_code", SELECT_SAMPLE))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct SampleRow {
    id: String,
    sample_code: String,
    request_id: String,
    test_method_id: Option<String>,
    name: String,
    sample_type: Option<String>,
    description: Option<String>,
    status: String,
    remarks: Option<String>,
    received_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SampleRow> for TestingSample {
    type Error = DbError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        Ok(TestingSample {
            id: convert::uuid(&row.id)?,
            sample_code: row.sample_code,
            request_id: convert::uuid(&row.request_id)?,
            test_method_id: convert::opt_uuid(row.test_method_id)?,
            name: row.name,
            sample_type: row.sample_type,
            description: row.description,
            status: convert::enum_value("sample status", &row.status)?,
            remarks: row.remarks,
            received_at: convert::opt_timestamp(row.received_at)?,
            completed_at: convert::opt_timestamp(row.completed_at)?,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
