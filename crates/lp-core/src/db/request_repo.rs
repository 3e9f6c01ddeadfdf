//! Request repository: submissions, lookups and status changes.
//!
//! Every submission runs in a single `BEGIN IMMEDIATE` transaction, so
//! concurrent submissions queue for the write lock. Run numbers are taken
//! with `UPDATE ... RETURNING` inside that transaction, so a failed
//! submission leaves the per-capability counters untouched and two
//! concurrent submissions can never be handed the same number.

use super::capability_repo::{allocate_run_number, fetch_capability};
use super::convert;
use super::equipment_repo::fetch_equipment;
use super::io_repo::fetch_io;
use super::sample_repo::{fetch_samples_for_request, insert_sample, update_sample};
use super::test_method_repo::fetch_test_methods;
use super::user_repo::fetch_user;
use super::{make_like_pattern, DbError, DbPool, PaginatedResult, Pagination};
use crate::models::{
    Capability, Priority, Request, RequestFilter, RequestStatus, RequestType,
    RequestWithSamples, SampleStatus, TestingSample,
};
use crate::submission::{
    format_request_number, format_sample_code, plan_asr, plan_ntr, AsrSubmission,
    CapabilityBatch, ErSubmission, NtrSubmission,
};
use crate::workflow::{cascade_sample_status, check_request_transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Repository trait for requests.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Submits an NTR, split into one request per capability.
    ///
    /// Returns every created request with its samples, in the order the
    /// capabilities first appear in the submission's lines.
    async fn submit_ntr(
        &self,
        submission: &NtrSubmission,
    ) -> Result<Vec<RequestWithSamples>, DbError>;

    /// Submits an ASR to a single capability.
    async fn submit_asr(&self, submission: &AsrSubmission) -> Result<RequestWithSamples, DbError>;

    /// Submits an equipment reservation.
    async fn submit_er(&self, submission: &ErSubmission) -> Result<Request, DbError>;

    /// Gets a request by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Request>, DbError>;

    /// Gets a request by its request number.
    async fn get_by_number(&self, request_number: &str) -> Result<Option<Request>, DbError>;

    /// Lists requests, newest first.
    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> Result<PaginatedResult<Request>, DbError>;

    /// Counts requests matching the filter.
    async fn count(&self, filter: &RequestFilter) -> Result<u64, DbError>;

    /// Moves a request to `status`. Rejection and cancellation cascade to
    /// the request's open samples.
    async fn update_status(&self, id: Uuid, status: RequestStatus) -> Result<Request, DbError>;

    /// Deletes a request and its samples.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_REQUEST: &str = "SELECT id, request_number, request_type, capability_id, submission_id, requester_id, io_id, title, priority, status, details, equipment_id, reservation_start, reservation_end, created_at, updated_at FROM requests";

/// SQLite implementation of RequestRepository.
pub struct SqliteRequestRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteRequestRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

/// Fields shared by every request created from one submission.
struct Envelope {
    kind: RequestType,
    submission_id: Uuid,
    requester_id: Uuid,
    io_id: Option<Uuid>,
    title: String,
    priority: Priority,
    now: DateTime<Utc>,
}

#[async_trait]
impl RequestRepository for SqliteRequestRepository {
    #[instrument(skip_all, fields(requester_id = %submission.requester_id))]
    async fn submit_ntr(
        &self,
        submission: &NtrSubmission,
    ) -> Result<Vec<RequestWithSamples>, DbError> {
        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;

        check_requester(&mut tx, submission.requester_id).await?;
        check_io(&mut tx, submission.io_id).await?;

        let method_ids: Vec<Uuid> = submission.lines.iter().map(|l| l.test_method_id).collect();
        let methods = fetch_test_methods(&mut tx, &method_ids).await?;
        let batches = plan_ntr(&methods, &submission.lines, &submission.samples)?;
        debug!(batches = batches.len(), "Planned NTR split");

        let envelope = Envelope {
            kind: RequestType::Ntr,
            submission_id: Uuid::new_v4(),
            requester_id: submission.requester_id,
            io_id: submission.io_id,
            title: submission.title.clone(),
            priority: submission.priority,
            now: Utc::now(),
        };

        let mut created = Vec::with_capacity(batches.len());
        for batch in &batches {
            let mut details = object_or_empty(&submission.details);
            details.insert(
                "test_method_ids".to_string(),
                json!(batch
                    .test_method_ids
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()),
            );
            let result = write_batch(&mut tx, &envelope, batch, Value::Object(details)).await?;
            created.push(result);
        }

        tx.commit().await?;

        info!(
            submission_id = %envelope.submission_id,
            requests = ?created.iter().map(|r| r.request.request_number.as_str()).collect::<Vec<_>>(),
            "NTR submitted"
        );
        Ok(created)
    }

    #[instrument(skip_all, fields(requester_id = %submission.requester_id))]
    async fn submit_asr(&self, submission: &AsrSubmission) -> Result<RequestWithSamples, DbError> {
        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;

        check_requester(&mut tx, submission.requester_id).await?;
        check_io(&mut tx, submission.io_id).await?;
        let batch = plan_asr(submission.capability_id, &submission.samples)?;

        let envelope = Envelope {
            kind: RequestType::Asr,
            submission_id: Uuid::new_v4(),
            requester_id: submission.requester_id,
            io_id: submission.io_id,
            title: submission.title.clone(),
            priority: submission.priority,
            now: Utc::now(),
        };
        let details = json!({
            "problem_statement": submission.problem_statement,
            "objective": submission.objective,
        });

        let created = write_batch(&mut tx, &envelope, &batch, details).await?;
        tx.commit().await?;

        info!(request_number = %created.request.request_number, "ASR submitted");
        Ok(created)
    }

    #[instrument(skip_all, fields(equipment_id = %submission.equipment_id))]
    async fn submit_er(&self, submission: &ErSubmission) -> Result<Request, DbError> {
        submission.validate_window()?;

        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;

        check_requester(&mut tx, submission.requester_id).await?;
        check_io(&mut tx, submission.io_id).await?;

        let equipment = fetch_equipment(&mut tx, submission.equipment_id)
            .await?
            .ok_or_else(|| {
                DbError::Validation(format!(
                    "Equipment {} does not exist",
                    submission.equipment_id
                ))
            })?;
        if !equipment.reservable {
            return Err(DbError::Validation(format!(
                "Equipment {} is not reservable",
                equipment.code
            )));
        }
        if !equipment.status.is_bookable() {
            return Err(DbError::Validation(format!(
                "Equipment {} is {} and cannot be reserved",
                equipment.code, equipment.status
            )));
        }

        for booked in open_reservations(&mut tx, equipment.id).await? {
            if let (Some(start), Some(end)) = (booked.reservation_start, booked.reservation_end) {
                if submission.overlaps(start, end) {
                    return Err(DbError::Conflict(format!(
                        "Equipment {} is already reserved by {} in the requested window",
                        equipment.code, booked.request_number
                    )));
                }
            }
        }

        let capability = active_capability(&mut tx, equipment.capability_id).await?;
        let run_no = allocate_run_number(&mut tx, capability.id).await?;
        let now = Utc::now();

        let request = Request {
            id: Uuid::new_v4(),
            request_number: format_request_number(
                RequestType::Er,
                &capability.short_name,
                now,
                run_no,
            ),
            request_type: RequestType::Er,
            capability_id: capability.id,
            submission_id: Uuid::new_v4(),
            requester_id: submission.requester_id,
            io_id: submission.io_id,
            title: submission.title.clone(),
            priority: Priority::Normal,
            status: RequestStatus::Submitted,
            details: json!({ "purpose": submission.purpose }),
            equipment_id: Some(equipment.id),
            reservation_start: Some(submission.reservation_start),
            reservation_end: Some(submission.reservation_end),
            created_at: now,
            updated_at: now,
        };
        insert_request(&mut tx, &request).await?;

        tx.commit().await?;

        info!(request_number = %request.request_number, "ER submitted");
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Request>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_request(&mut conn, id).await
    }

    async fn get_by_number(&self, request_number: &str) -> Result<Option<Request>, DbError> {
        let row: Option<RequestRow> =
            sqlx::query_as(&format!("{} WHERE request_number = ?", SELECT_REQUEST))
                .bind(request_number)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> Result<PaginatedResult<Request>, DbError> {
        let total = self.count(filter).await?;

        let (where_clause, params) = build_where(filter);
        let query = format!(
            "{} {} ORDER BY created_at DESC, request_number DESC LIMIT ? OFFSET ?",
            SELECT_REQUEST, where_clause
        );

        let mut sqlx_query = sqlx::query_as::<_, RequestRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }
        sqlx_query = sqlx_query
            .bind(pagination.limit() as i64)
            .bind(pagination.offset() as i64);

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Request>, _>>()?;

        Ok(PaginatedResult::new(items, total, pagination))
    }

    async fn count(&self, filter: &RequestFilter) -> Result<u64, DbError> {
        let (where_clause, params) = build_where(filter);
        let query = format!("SELECT COUNT(*) FROM requests {}", where_clause);

        let mut sqlx_query = sqlx::query_scalar::<_, i64>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let count = sqlx_query.fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    #[instrument(skip_all, fields(request_id = %id, status = %status))]
    async fn update_status(&self, id: Uuid, status: RequestStatus) -> Result<Request, DbError> {
        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;
        let now = Utc::now();

        let mut request = fetch_request(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Request", id))?;

        check_request_transition(request.status, status)?;
        if request.status == status {
            return Ok(request);
        }

        set_request_status(&mut tx, id, status, now).await?;

        if let Some(sample_status) = cascade_sample_status(status) {
            let mut cascaded = 0usize;
            for mut sample in fetch_samples_for_request(&mut tx, id).await? {
                if sample.status.is_terminal() {
                    continue;
                }
                sample.status = sample_status;
                sample.updated_at = now;
                update_sample(&mut tx, &sample).await?;
                cascaded += 1;
            }
            debug!(cascaded, "Cascaded request status to samples");
        }

        tx.commit().await?;

        info!(
            request_number = %request.request_number,
            from = %request.status,
            to = %status,
            "Request status updated"
        );
        request.status = status;
        request.updated_at = now;
        Ok(request)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tx = DbPool::from_pool(self.pool.clone()).begin_write().await?;

        sqlx::query("DELETE FROM testing_samples WHERE request_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the request repository.
pub fn create_request_repository(pool: &DbPool) -> Box<dyn RequestRepository> {
    Box::new(SqliteRequestRepository::new(pool.inner().clone()))
}

fn build_where(filter: &RequestFilter) -> (String, Vec<String>) {
    let mut clause = String::from("WHERE 1=1");
    let mut params = Vec::new();

    if let Some(request_type) = filter.request_type {
        clause.push_str(" AND request_type = ?");
        params.push(request_type.as_db_str().to_string());
    }
    if let Some(status) = filter.status {
        clause.push_str(" AND status = ?");
        params.push(status.as_db_str().to_string());
    }
    if let Some(capability_id) = filter.capability_id {
        clause.push_str(" AND capability_id = ?");
        params.push(capability_id.to_string());
    }
    if let Some(requester_id) = filter.requester_id {
        clause.push_str(" AND requester_id = ?");
        params.push(requester_id.to_string());
    }
    if let Some(submission_id) = filter.submission_id {
        clause.push_str(" AND submission_id = ?");
        params.push(submission_id.to_string());
    }
    if let Some(search) = &filter.search {
        clause.push_str(r" AND (request_number LIKE ? ESCAPE '\' OR title LIKE ? ESCAPE '\')");
        let pattern = make_like_pattern(search);
        params.push(pattern.clone());
        params.push(pattern);
    }

    (clause, params)
}

fn object_or_empty(details: &Value) -> serde_json::Map<String, Value> {
    match details {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    }
}

async fn check_requester(conn: &mut SqliteConnection, requester_id: Uuid) -> Result<(), DbError> {
    match fetch_user(conn, requester_id).await? {
        Some(user) if user.is_active => Ok(()),
        Some(user) => Err(DbError::Validation(format!(
            "Requester {} is not active",
            user.email
        ))),
        None => Err(DbError::Validation(format!(
            "Requester {} does not exist",
            requester_id
        ))),
    }
}

async fn check_io(conn: &mut SqliteConnection, io_id: Option<Uuid>) -> Result<(), DbError> {
    let Some(io_id) = io_id else {
        return Ok(());
    };
    match fetch_io(conn, io_id).await? {
        Some(io) if io.is_active => Ok(()),
        Some(io) => Err(DbError::Validation(format!(
            "IO {} is not active",
            io.io_number
        ))),
        None => Err(DbError::Validation(format!("IO {} does not exist", io_id))),
    }
}

async fn active_capability(
    conn: &mut SqliteConnection,
    capability_id: Uuid,
) -> Result<Capability, DbError> {
    match fetch_capability(conn, capability_id).await? {
        Some(capability) if capability.is_active => Ok(capability),
        Some(capability) => Err(DbError::Validation(format!(
            "Capability {} is not accepting requests",
            capability.short_name
        ))),
        None => Err(DbError::Validation(format!(
            "Capability {} does not exist",
            capability_id
        ))),
    }
}

/// Writes one request and its samples for a planned capability batch.
async fn write_batch(
    conn: &mut SqliteConnection,
    envelope: &Envelope,
    batch: &CapabilityBatch,
    details: Value,
) -> Result<RequestWithSamples, DbError> {
    let capability = active_capability(conn, batch.capability_id).await?;
    let run_no = allocate_run_number(conn, capability.id).await?;
    let request_number =
        format_request_number(envelope.kind, &capability.short_name, envelope.now, run_no);

    let request = Request {
        id: Uuid::new_v4(),
        request_number,
        request_type: envelope.kind,
        capability_id: capability.id,
        submission_id: envelope.submission_id,
        requester_id: envelope.requester_id,
        io_id: envelope.io_id,
        title: envelope.title.clone(),
        priority: envelope.priority,
        status: RequestStatus::Submitted,
        details,
        equipment_id: None,
        reservation_start: None,
        reservation_end: None,
        created_at: envelope.now,
        updated_at: envelope.now,
    };
    insert_request(conn, &request).await?;

    let mut samples = Vec::with_capacity(batch.samples.len());
    for (idx, planned) in batch.samples.iter().enumerate() {
        let sample = TestingSample {
            id: Uuid::new_v4(),
            sample_code: format_sample_code(&request.request_number, idx + 1),
            request_id: request.id,
            test_method_id: planned.test_method_id,
            name: planned.sample.name.trim().to_string(),
            sample_type: planned.sample.sample_type.clone(),
            description: planned.sample.description.clone(),
            status: SampleStatus::Submitted,
            remarks: planned.remarks.clone(),
            received_at: None,
            completed_at: None,
            created_at: envelope.now,
            updated_at: envelope.now,
        };
        insert_sample(conn, &sample).await?;
        samples.push(sample);
    }

    Ok(RequestWithSamples { request, samples })
}

async fn open_reservations(
    conn: &mut SqliteConnection,
    equipment_id: Uuid,
) -> Result<Vec<Request>, DbError> {
    let rows: Vec<RequestRow> = sqlx::query_as(&format!(
        "{} WHERE request_type = 'er' AND equipment_id = ? AND status IN ('submitted', 'in_progress')",
        SELECT_REQUEST
    ))
    .bind(equipment_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) async fn insert_request(
    conn: &mut SqliteConnection,
    request: &Request,
) -> Result<(), DbError> {
    let details = serde_json::to_string(&request.details)?;

    sqlx::query(
        r#"
        INSERT INTO requests (id, request_number, request_type, capability_id, submission_id,
                              requester_id, io_id, title, priority, status, details, equipment_id,
                              reservation_start, reservation_end, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id.to_string())
    .bind(&request.request_number)
    .bind(request.request_type.as_db_str())
    .bind(request.capability_id.to_string())
    .bind(request.submission_id.to_string())
    .bind(request.requester_id.to_string())
    .bind(request.io_id.map(|id| id.to_string()))
    .bind(&request.title)
    .bind(request.priority.as_db_str())
    .bind(request.status.as_db_str())
    .bind(&details)
    .bind(request.equipment_id.map(|id| id.to_string()))
    .bind(request.reservation_start.map(|t| t.to_rfc3339()))
    .bind(request.reservation_end.map(|t| t.to_rfc3339()))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_request(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Request>, DbError> {
    let row: Option<RequestRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_REQUEST))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_all_requests(
    conn: &mut SqliteConnection,
) -> Result<Vec<Request>, DbError> {
    let rows: Vec<RequestRow> =
        sqlx::query_as(&format!("{} ORDER BY request_number", SELECT_REQUEST))
            .fetch_all(&mut *conn)
            .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) async fn set_request_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: RequestStatus,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE requests SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_db_str())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    request_number: String,
    request_type: String,
    capability_id: String,
    submission_id: String,
    requester_id: String,
    io_id: Option<String>,
    title: String,
    priority: String,
    status: String,
    details: String,
    equipment_id: Option<String>,
    reservation_start: Option<String>,
    reservation_end: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RequestRow> for Request {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Request {
            id: convert::uuid(&row.id)?,
            request_number: row.request_number,
            request_type: convert::enum_value("request type", &row.request_type)?,
            capability_id: convert::uuid(&row.capability_id)?,
            submission_id: convert::uuid(&row.submission_id)?,
            requester_id: convert::uuid(&row.requester_id)?,
            io_id: convert::opt_uuid(row.io_id)?,
            title: row.title,
            priority: convert::enum_value("priority", &row.priority)?,
            status: convert::enum_value("request status", &row.status)?,
            details: serde_json::from_str(&row.details)?,
            equipment_id: convert::opt_uuid(row.equipment_id)?,
            reservation_start: convert::opt_timestamp(row.reservation_start)?,
            reservation_end: convert::opt_timestamp(row.reservation_end)?,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
