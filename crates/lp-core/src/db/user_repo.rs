//! User repository for database operations.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{User, UserFilter, UserUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Repository trait for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates a new user.
    async fn create(&self, user: &User) -> Result<User, DbError>;

    /// Gets a user by ID.
    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError>;

    /// Gets a user by email (case-insensitive).
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    /// Lists users with optional filtering.
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DbError>;

    /// Updates a user.
    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<User, DbError>;

    /// Deletes a user.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_USER: &str = "SELECT id, email, name, role, capability_id, department, is_active, created_at, updated_at FROM users";

/// SQLite implementation of UserRepository.
pub struct SqliteUserRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut conn, user).await?;
        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{} WHERE LOWER(email) = LOWER(?)", SELECT_USER))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_USER);
        let mut params: Vec<String> = Vec::new();

        if let Some(role) = &filter.role {
            query.push_str(" AND role = ?");
            params.push(role.as_str().to_string());
        }

        if let Some(capability_id) = filter.capability_id {
            query.push_str(" AND capability_id = ?");
            params.push(capability_id.to_string());
        }

        if let Some(is_active) = filter.is_active {
            query.push_str(" AND is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(r" AND (email LIKE ? ESCAPE '\' OR name LIKE ? ESCAPE '\')");
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY name ASC");

        let mut sqlx_query = sqlx::query_as::<_, UserRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<User, DbError> {
        let mut user = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(capability_id) = update.capability_id {
            user.capability_id = capability_id;
        }
        if let Some(department) = &update.department {
            user.department = department.clone();
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET email = ?, name = ?, role = ?, capability_id = ?, department = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.capability_id.map(|id| id.to_string()))
        .bind(&user.department)
        .bind(user.is_active)
        .bind(user.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the user repository.
pub fn create_user_repository(pool: &DbPool) -> Box<dyn UserRepository> {
    Box::new(SqliteUserRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, role, capability_id, department, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(user.capability_id.map(|id| id.to_string()))
    .bind(&user.department)
    .bind(user.is_active)
    .bind(user.created_at.to_rfc3339())
    .bind(user.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_user(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<User>, DbError> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(TryInto::try_into).transpose()
}

pub(crate) async fn fetch_all_users(conn: &mut SqliteConnection) -> Result<Vec<User>, DbError> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!("{} ORDER BY email", SELECT_USER))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    capability_id: Option<String>,
    department: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: convert::uuid(&row.id)?,
            email: row.email,
            name: row.name,
            role: convert::enum_value("role", &row.role)?,
            capability_id: convert::opt_uuid(row.capability_id)?,
            department: row.department,
            is_active: row.is_active,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}
