//! Equipment repository.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{Equipment, EquipmentFilter, EquipmentUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Repository trait for equipment persistence.
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    /// Creates a new piece of equipment.
    async fn create(&self, equipment: &Equipment) -> Result<Equipment, DbError>;

    /// Gets equipment by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Equipment>, DbError>;

    /// Lists equipment matching the filter, ordered by code.
    async fn list(&self, filter: &EquipmentFilter) -> Result<Vec<Equipment>, DbError>;

    /// Updates equipment.
    async fn update(&self, id: Uuid, update: &EquipmentUpdate) -> Result<Equipment, DbError>;

    /// Deletes equipment.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_EQUIPMENT: &str = "SELECT id, code, name, capability_id, location_id, status, reservable, description, created_at, updated_at FROM equipment";

/// SQLite implementation of EquipmentRepository.
pub struct SqliteEquipmentRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteEquipmentRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentRepository for SqliteEquipmentRepository {
    async fn create(&self, equipment: &Equipment) -> Result<Equipment, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_equipment(&mut conn, equipment).await?;
        Ok(equipment.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Equipment>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_equipment(&mut conn, id).await
    }

    async fn list(&self, filter: &EquipmentFilter) -> Result<Vec<Equipment>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_EQUIPMENT);
        let mut params: Vec<String> = Vec::new();

        if let Some(capability_id) = filter.capability_id {
            query.push_str(" AND capability_id = ?");
            params.push(capability_id.to_string());
        }

        if let Some(location_id) = filter.location_id {
            query.push_str(" AND location_id = ?");
            params.push(location_id.to_string());
        }

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            params.push(status.as_db_str().to_string());
        }

        if let Some(reservable) = filter.reservable {
            query.push_str(" AND reservable = ?");
            params.push(if reservable { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(r" AND (code LIKE ? ESCAPE '\' OR name LIKE ? ESCAPE '\')");
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY code ASC");

        let mut sqlx_query = sqlx::query_as::<_, EquipmentRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &EquipmentUpdate) -> Result<Equipment, DbError> {
        let mut equipment = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Equipment", id))?;

        if let Some(code) = &update.code {
            equipment.code = code.clone();
        }
        if let Some(name) = &update.name {
            equipment.name = name.clone();
        }
        if let Some(capability_id) = update.capability_id {
            equipment.capability_id = capability_id;
        }
        if let Some(location_id) = update.location_id {
            equipment.location_id = location_id;
        }
        if let Some(status) = update.status {
            equipment.status = status;
        }
        if let Some(reservable) = update.reservable {
            equipment.reservable = reservable;
        }
        if let Some(description) = &update.description {
            equipment.description = description.clone();
        }
        equipment.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE equipment
            SET code = ?, name = ?, capability_id = ?, location_id = ?, status = ?,
                reservable = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&equipment.code)
        .bind(&equipment.name)
        .bind(equipment.capability_id.to_string())
        .bind(equipment.location_id.map(|id| id.to_string()))
        .bind(equipment.status.as_db_str())
        .bind(equipment.reservable)
        .bind(&equipment.description)
        .bind(equipment.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the equipment repository.
pub fn create_equipment_repository(pool: &DbPool) -> Box<dyn EquipmentRepository> {
    Box::new(SqliteEquipmentRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_equipment(
    conn: &mut SqliteConnection,
    equipment: &Equipment,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO equipment (id, code, name, capability_id, location_id, status, reservable, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(equipment.id.to_string())
    .bind(&equipment.code)
    .bind(&equipment.name)
    .bind(equipment.capability_id.to_string())
    .bind(equipment.location_id.map(|id| id.to_string()))
    .bind(equipment.status.as_db_str())
    .bind(equipment.reservable)
    .bind(&equipment.description)
    .bind(equipment.created_at.to_rfc3339())
    .bind(equipment.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_equipment(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Equipment>, DbError> {
    let row: Option<EquipmentRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_EQUIPMENT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_all_equipment(
    conn: &mut SqliteConnection,
) -> Result<Vec<Equipment>, DbError> {
    let rows: Vec<EquipmentRow> = sqlx::query_as(&format!("{} ORDER BY code", SELECT_EQUIPMENT))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct EquipmentRow {
    id: String,
    code: String,
    name: String,
    capability_id: String,
    location_id: Option<String>,
    status: String,
    reservable: bool,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = DbError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Equipment {
            id: convert::uuid(&row.id)?,
            code: row.code,
            name: row.name,
            capability_id: convert::uuid(&row.capability_id)?,
            location_id: convert::opt_uuid(row.location_id)?,
            status: convert::enum_value("equipment status", &row.status)?,
            reservable: row.reservable,
            description: row.description,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
