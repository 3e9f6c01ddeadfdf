//! Capability repository for database operations.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{Capability, CapabilityFilter, CapabilityUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Repository trait for capability persistence.
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    /// Creates a new capability.
    async fn create(&self, capability: &Capability) -> Result<Capability, DbError>;

    /// Gets a capability by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Capability>, DbError>;

    /// Gets a capability by its short name.
    async fn get_by_short_name(&self, short_name: &str) -> Result<Option<Capability>, DbError>;

    /// Lists capabilities ordered by name.
    async fn list(&self, filter: &CapabilityFilter) -> Result<Vec<Capability>, DbError>;

    /// Updates a capability.
    async fn update(&self, id: Uuid, update: &CapabilityUpdate) -> Result<Capability, DbError>;

    /// Deletes a capability. Fails with a constraint error while referenced.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_CAPABILITY: &str = "SELECT id, name, short_name, description, req_run_no, is_active, created_at, updated_at FROM capabilities";

/// SQLite implementation of CapabilityRepository.
pub struct SqliteCapabilityRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteCapabilityRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapabilityRepository for SqliteCapabilityRepository {
    async fn create(&self, capability: &Capability) -> Result<Capability, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_capability(&mut conn, capability).await?;
        Ok(capability.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Capability>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_capability(&mut conn, id).await
    }

    async fn get_by_short_name(&self, short_name: &str) -> Result<Option<Capability>, DbError> {
        let row: Option<CapabilityRow> =
            sqlx::query_as(&format!("{} WHERE short_name = ?", SELECT_CAPABILITY))
                .bind(short_name.to_uppercase())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &CapabilityFilter) -> Result<Vec<Capability>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_CAPABILITY);
        let mut params: Vec<String> = Vec::new();

        if let Some(is_active) = filter.is_active {
            query.push_str(" AND is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(
                r" AND (name LIKE ? ESCAPE '\' OR short_name LIKE ? ESCAPE '\')",
            );
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY name ASC");

        let mut sqlx_query = sqlx::query_as::<_, CapabilityRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &CapabilityUpdate) -> Result<Capability, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Capability", id))?;

        let name = update.name.as_ref().unwrap_or(&existing.name);
        let short_name = update
            .short_name
            .as_ref()
            .map(|s| s.to_uppercase())
            .unwrap_or(existing.short_name);
        let description = match &update.description {
            Some(d) => d.clone(),
            None => existing.description,
        };
        let is_active = update.is_active.unwrap_or(existing.is_active);

        sqlx::query(
            r#"
            UPDATE capabilities SET name = ?, short_name = ?, description = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(&short_name)
        .bind(&description)
        .bind(is_active)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Capability", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM capabilities WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the capability repository.
pub fn create_capability_repository(pool: &DbPool) -> Box<dyn CapabilityRepository> {
    Box::new(SqliteCapabilityRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_capability(
    conn: &mut SqliteConnection,
    capability: &Capability,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO capabilities (id, name, short_name, description, req_run_no, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(capability.id.to_string())
    .bind(&capability.name)
    .bind(&capability.short_name)
    .bind(&capability.description)
    .bind(capability.req_run_no)
    .bind(capability.is_active)
    .bind(capability.created_at.to_rfc3339())
    .bind(capability.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_capability(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Capability>, DbError> {
    let row: Option<CapabilityRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_CAPABILITY))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_all_capabilities(
    conn: &mut SqliteConnection,
) -> Result<Vec<Capability>, DbError> {
    let rows: Vec<CapabilityRow> = sqlx::query_as(&format!("{} ORDER BY name", SELECT_CAPABILITY))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Increments the capability's run counter and returns the new value.
///
/// The increment is a single `UPDATE ... RETURNING` statement. Callers run it
/// inside the transaction that also writes the request, so a rolled back
/// submission does not consume a number.
pub(crate) async fn allocate_run_number(
    conn: &mut SqliteConnection,
    capability_id: Uuid,
) -> Result<i64, DbError> {
    let run_no: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE capabilities SET req_run_no = req_run_no + 1, updated_at = ?
        WHERE id = ?
        RETURNING req_run_no
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(capability_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    run_no.ok_or_else(|| DbError::not_found("Capability", capability_id))
}

#[derive(sqlx::FromRow)]
struct CapabilityRow {
    id: String,
    name: String,
    short_name: String,
    description: Option<String>,
    req_run_no: i64,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CapabilityRow> for Capability {
    type Error = DbError;

    fn try_from(row: CapabilityRow) -> Result<Self, Self::Error> {
        Ok(Capability {
            id: convert::uuid(&row.id)?,
            name: row.name,
            short_name: row.short_name,
            description: row.description,
            req_run_no: row.req_run_no,
            is_active: row.is_active,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
