//! Test method catalog repository.

use super::convert;
use super::{make_like_pattern, DbError, DbPool};
use crate::models::{TestMethod, TestMethodFilter, TestMethodUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
pub trait TestMethodRepository: Send + Sync {
    async fn create(&self, method: &TestMethod) -> Result<TestMethod, DbError>;
    async fn get(&self, id: Uuid) -> Result<Option<TestMethod>, DbError>;
    async fn list(&self, filter: &TestMethodFilter) -> Result<Vec<TestMethod>, DbError>;
    async fn update(&self, id: Uuid, update: &TestMethodUpdate) -> Result<TestMethod, DbError>;
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

const SELECT_TEST_METHOD: &str = "SELECT id, code, name, capability_id, equipment_id, price, turnaround_days, sample_requirement, is_active, created_at, updated_at FROM test_methods";

pub struct SqliteTestMethodRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteTestMethodRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestMethodRepository for SqliteTestMethodRepository {
    async fn create(&self, method: &TestMethod) -> Result<TestMethod, DbError> {
        let mut conn = self.pool.acquire().await?;
        insert_test_method(&mut conn, method).await?;
        Ok(method.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TestMethod>, DbError> {
        let row: Option<TestMethodRow> =
            sqlx::query_as(&format!("{} WHERE id = ?", SELECT_TEST_METHOD))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &TestMethodFilter) -> Result<Vec<TestMethod>, DbError> {
        let mut query = format!("{} WHERE 1=1", SELECT_TEST_METHOD);
        let mut params: Vec<String> = Vec::new();

        if let Some(capability_id) = filter.capability_id {
            query.push_str(" AND capability_id = ?");
            params.push(capability_id.to_string());
        }

        if let Some(is_active) = filter.is_active {
            query.push_str(" AND is_active = ?");
            params.push(if is_active { "1" } else { "0" }.to_string());
        }

        if let Some(search) = &filter.search {
            query.push_str(r" AND (code LIKE ? ESCAPE '\' OR name LIKE ? ESCAPE '\')");
            let pattern = make_like_pattern(search);
            params.push(pattern.clone());
            params.push(pattern);
        }

        query.push_str(" ORDER BY code ASC");

        let mut sqlx_query = sqlx::query_as::<_, TestMethodRow>(&query);
        for param in params {
            sqlx_query = sqlx_query.bind(param);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &TestMethodUpdate) -> Result<TestMethod, DbError> {
        let mut method = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("TestMethod", id))?;

        if let Some(code) = &update.code {
            method.code = code.clone();
        }
        if let Some(name) = &update.name {
            method.name = name.clone();
        }
        if let Some(capability_id) = update.capability_id {
            method.capability_id = capability_id;
        }
        if let Some(equipment_id) = update.equipment_id {
            method.equipment_id = equipment_id;
        }
        if let Some(price) = update.price {
            method.price = price;
        }
        if let Some(turnaround_days) = update.turnaround_days {
            method.turnaround_days = turnaround_days;
        }
        if let Some(sample_requirement) = &update.sample_requirement {
            method.sample_requirement = sample_requirement.clone();
        }
        if let Some(is_active) = update.is_active {
            method.is_active = is_active;
        }
        method.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE test_methods
            SET code = ?, name = ?, capability_id = ?, equipment_id = ?, price = ?,
                turnaround_days = ?, sample_requirement = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.capability_id.to_string())
        .bind(method.equipment_id.map(|id| id.to_string()))
        .bind(method.price)
        .bind(method.turnaround_days)
        .bind(&method.sample_requirement)
        .bind(method.is_active)
        .bind(method.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(method)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM test_methods WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub fn create_test_method_repository(pool: &DbPool) -> Box<dyn TestMethodRepository> {
    Box::new(SqliteTestMethodRepository::new(pool.inner().clone()))
}

pub(crate) async fn insert_test_method(
    conn: &mut SqliteConnection,
    method: &TestMethod,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO test_methods (id, code, name, capability_id, equipment_id, price, turnaround_days,
                                  sample_requirement, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(method.id.to_string())
    .bind(&method.code)
    .bind(&method.name)
    .bind(method.capability_id.to_string())
    .bind(method.equipment_id.map(|id| id.to_string()))
    .bind(method.price)
    .bind(method.turnaround_days)
    .bind(&method.sample_requirement)
    .bind(method.is_active)
    .bind(method.created_at.to_rfc3339())
    .bind(method.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Loads the given methods. Unknown ids are simply absent from the result.
pub(crate) async fn fetch_test_methods(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<Vec<TestMethod>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!("{} WHERE id IN ({})", SELECT_TEST_METHOD, placeholders);

    let mut sqlx_query = sqlx::query_as::<_, TestMethodRow>(&query);
    for id in ids {
        sqlx_query = sqlx_query.bind(id.to_string());
    }

    let rows = sqlx_query.fetch_all(&mut *conn).await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) async fn fetch_all_test_methods(
    conn: &mut SqliteConnection,
) -> Result<Vec<TestMethod>, DbError> {
    let rows: Vec<TestMethodRow> = sqlx::query_as(&format!("{} ORDER BY code", SELECT_TEST_METHOD))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(sqlx::FromRow)]
struct TestMethodRow {
    id: String,
    code: String,
    name: String,
    capability_id: String,
    equipment_id: Option<String>,
    price: f64,
    turnaround_days: i64,
    sample_requirement: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TestMethodRow> for TestMethod {
    type Error = DbError;

    fn try_from(row: TestMethodRow) -> Result<Self, Self::Error> {
        Ok(TestMethod {
            id: convert::uuid(&row.id)?,
            code: row.code,
            name: row.name,
            capability_id: convert::uuid(&row.capability_id)?,
            equipment_id: convert::opt_uuid(row.equipment_id)?,
            price: row.price,
            turnaround_days: row.turnaround_days,
            sample_requirement: row.sample_requirement,
            is_active: row.is_active,
            created_at: convert::timestamp(&row.created_at)?,
            updated_at: convert::timestamp(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_capability_repository, create_memory_pool};
    use crate::models::Capability;

    #[tokio::test]
    async fn test_create_update_list() {
        let db = create_memory_pool().await.unwrap();
        let cap = Capability::new("Thermal Analysis", "TA");
        create_capability_repository(&db).create(&cap).await.unwrap();
        let repo = create_test_method_repository(&db);

        let mut dsc = TestMethod::new("TA-DSC", "DSC melting point", cap.id);
        dsc.price = 120.0;
        dsc.turnaround_days = 5;
        repo.create(&dsc).await.unwrap();
        repo.create(&TestMethod::new("TA-TGA", "TGA", cap.id)).await.unwrap();

        let updated = repo
            .update(
                dsc.id,
                &TestMethodUpdate {
                    price: Some(150.0),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 150.0);
        assert_eq!(updated.turnaround_days, 5);

        let active = repo
            .list(&TestMethodFilter {
                capability_id: Some(cap.id),
                is_active: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "TA-TGA");
    }

    #[tokio::test]
    async fn test_fetch_many_skips_unknown_ids() {
        let db = create_memory_pool().await.unwrap();
        let cap = Capability::new("Thermal Analysis", "TA");
        create_capability_repository(&db).create(&cap).await.unwrap();
        let repo = create_test_method_repository(&db);
        let dsc = TestMethod::new("TA-DSC", "DSC", cap.id);
        repo.create(&dsc).await.unwrap();

        let mut conn = db.inner().acquire().await.unwrap();
        let found = fetch_test_methods(&mut conn, &[dsc.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(fetch_test_methods(&mut conn, &[]).await.unwrap().is_empty());
    }
}
