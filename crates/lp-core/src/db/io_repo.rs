//! Internal order (IO) repository.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{Io, IoFilter, IoUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
pub trait IoRepository: Send + Sync {
    async fn create(&self, io: &Io) -> Result<Io, DbError>;
    async fn get(&self, id: Uuid) -> Result<Option<Io>, DbError>;
    async fn list(&self, filter: &IoFilter) -> Result<Vec<Io>, DbError>;
    async fn update(&self, id: Uuid, update: &IoUpdate) -> Result<Io, DbError>;
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_IO: &str =
    "SELECT id, io_number, name, responsible, cost_center, is_active, created_at, updated_at FROM ios";

pub struct SqliteIoRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteIoRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IoRepository for SqliteIoRepository {
    async fn create(&self, io: &Io) -> Result<Io, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_io(&mut conn, io).await?;
        Ok(io.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Io>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_io(&mut conn, id).await
    }

    async fn list(&self, filter: &IoFilter) -> Result<Vec<Io>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_IO);
        let mut params: Vec<String> = Vec::new();

        if let Some(is_active) = filter.is_active {
            query.push_str(" AND is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(r" AND (io_number LIKE ? ESCAPE '\' OR name LIKE ? ESCAPE '\')");
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY io_number ASC");

        let mut sqlx_query = sqlx::query_as::<_, IoRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &IoUpdate) -> Result<Io, DbError> {
        let mut io = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("IO", id))?;

        if let Some(io_number) = &update.io_number {
            io.io_number = io_number.clone();
        }
        if let Some(name) = &update.name {
            io.name = name.clone();
        }
        if let Some(responsible) = &update.responsible {
            io.responsible = responsible.clone();
        }
        if let Some(cost_center) = &update.cost_center {
            io.cost_center = cost_center.clone();
        }
        if let Some(is_active) = update.is_active {
            io.is_active = is_active;
        }
        io.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE ios SET io_number = ?, name = ?, responsible = ?, cost_center = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&io.io_number)
        .bind(&io.name)
        .bind(&io.responsible)
        .bind(&io.cost_center)
        .bind(io.is_active)
        .bind(io.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(io)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM ios WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub fn create_io_repository(pool: &DbPool) -> Box<dyn IoRepository> {
    Box::new(SqliteIoRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_io(conn: &mut SqliteConnection, io: &Io) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO ios (id, io_number, name, responsible, cost_center, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(io.id.to_string())
    .bind(&io.io_number)
    .bind(&io.name)
    .bind(&io.responsible)
    .bind(&io.cost_center)
    .bind(io.is_active)
    .bind(io.created_at.to_rfc3339())
    .bind(io.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_io(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Io>, DbError> {
    let row: Option<IoRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_IO))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_all_ios(conn: &mut SqliteConnection) -> Result<Vec<Io>, DbError> {
    let rows: Vec<IoRow> = sqlx::query_as(&format!("{} ORDER BY io_number", SELECT_IO))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct IoRow {
    id: String,
    io_number: String,
    name: String,
    responsible: Option<String>,
    cost_center: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<IoRow> for Io {
    type Error = DbError;

    fn try_from(row: IoRow) -> Result<Self, Self::Error> {
        Ok(Io {
            id: convert::uuid(&row.id)?,
            io_number: row.io_number,
            name: row.name,
            responsible: row.responsible,
            cost_center: row.cost_center,
            is_active: row.is_active,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
