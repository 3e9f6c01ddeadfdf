//! Location repository.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{Location, LocationFilter, LocationUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &Location) -> Result<Location, DbError>;
    async fn get(&self, id: Uuid) -> Result<Option<Location>, DbError>;
    async fn list(&self, filter: &LocationFilter) -> Result<Vec<Location>, DbError>;
    async fn update(&self, id: Uuid, update: &LocationUpdate) -> Result<Location, DbError>;
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_LOCATION: &str = "SELECT id, name, building, floor, room, description, is_active, created_at, updated_at FROM locations";

pub struct SqliteLocationRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteLocationRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for SqliteLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_location(&mut conn, location).await?;
        Ok(location.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Location>, DbError> {
        let row: Option<LocationRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_LOCATION))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &LocationFilter) -> Result<Vec<Location>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_LOCATION);
        let mut params: Vec<String> = Vec::new();

        if let Some(is_active) = filter.is_active {
            query.push_str(" AND is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(r" AND (name LIKE ? ESCAPE '\' OR building LIKE ? ESCAPE '\')");
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY name ASC");

        let mut sqlx_query = sqlx::query_as::<_, LocationRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &LocationUpdate) -> Result<Location, DbError> {
        let mut location = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))?;

        if let Some(name) = &update.name {
            location.name = name.clone();
        }
        if let Some(building) = &update.building {
            location.building = building.clone();
        }
        if let Some(floor) = &update.floor {
            location.floor = floor.clone();
        }
        if let Some(room) = &update.room {
            location.room = room.clone();
        }
        if let Some(description) = &update.description {
            location.description = description.clone();
        }
        if let Some(is_active) = update.is_active {
            location.is_active = is_active;
        }
        location.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE locations
            SET name = ?, building = ?, floor = ?, room = ?, description = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&location.name)
        .bind(&location.building)
        .bind(&location.floor)
        .bind(&location.room)
        .bind(&location.description)
        .bind(location.is_active)
        .bind(location.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(location)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub fn create_location_repository(pool: &DbPool) -> Box<dyn LocationRepository> {
    Box::new(SqliteLocationRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_location(
    conn: &mut SqliteConnection,
    location: &Location,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO locations (id, name, building, floor, room, description, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(location.id.to_string())
    .bind(&location.name)
    .bind(&location.building)
    .bind(&location.floor)
    .bind(&location.room)
    .bind(&location.description)
    .bind(location.is_active)
    .bind(location.created_at.to_rfc3339())
    .bind(location.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_all_locations(
    conn: &mut SqliteConnection,
) -> Result<Vec<Location>, DbError> {
    let rows: Vec<LocationRow> = sqlx::query_as(&format!("{} ORDER BY name", SELECT_LOCATION))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: String,
    name: String,
    building: Option<String>,
    floor: Option<String>,
    room: Option<String>,
    description: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<LocationRow> for Location {
    type Error = DbError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        Ok(Location {
            id: convert::uuid(&row.id)?,
            name: row.name,
            building: row.building,
            floor: row.floor,
            room: row.room,
            description: row.description,
            is_active: row.is_active,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
