//! Database connection pool management.

use super::DbError;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Escapes special characters in a search pattern for use in SQL LIKE clauses.
///
/// Queries using the result must declare `ESCAPE '\'`.
///
/// ```
/// use lp_core::db::escape_like_pattern;
///
/// assert_eq!(escape_like_pattern("PP_10%"), r"PP\_10\%");
/// ```
pub fn escape_like_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Creates a LIKE pattern that matches anywhere in the string.
///
/// ```
/// use lp_core::db::make_like_pattern;
///
/// assert_eq!(make_like_pattern("ASTM_D"), r"%ASTM\_D%");
/// ```
pub fn make_like_pattern(search: &str) -> String {
    format!("%{}%", escape_like_pattern(search))
}

/// Shared SQLite connection pool.
#[derive(Clone)]
pub struct DbPool {
    pool: SqlitePool,
}

/// Options for creating a database connection pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Maximum time to wait for a connection.
    pub acquire_timeout: Duration,
    /// Maximum lifetime of a connection.
    pub max_lifetime: Option<Duration>,
    /// Idle timeout for connections.
    pub idle_timeout: Option<Duration>,
    /// How long a connection waits for another writer to release the lock.
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let acquire_timeout_secs = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let busy_timeout_secs = std::env::var("DATABASE_BUSY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            max_connections,
            min_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            max_lifetime: Some(Duration::from_secs(1800)),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(busy_timeout_secs),
        }
    }
}

/// Creates a database connection pool from a `sqlite:` URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, DbError> {
    create_pool_with_options(database_url, PoolOptions::default()).await
}

/// Creates a database connection pool with custom options.
pub async fn create_pool_with_options(
    database_url: &str,
    options: PoolOptions,
) -> Result<DbPool, DbError> {
    if !database_url.starts_with("sqlite:") {
        return Err(DbError::Configuration(format!(
            "Unsupported database URL scheme. Expected sqlite:, got: {}",
            database_url.split(':').next().unwrap_or("unknown")
        )));
    }

    let mut connect_options =
        SqliteConnectOptions::from_str(database_url)?.busy_timeout(options.busy_timeout);
    // WAL lets readers proceed while a submission holds the write lock.
    if !is_memory_url(database_url) {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    info!("Creating SQLite connection pool");
    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .min_connections(options.min_connections)
        .acquire_timeout(options.acquire_timeout)
        .max_lifetime(options.max_lifetime)
        .idle_timeout(options.idle_timeout)
        .connect_with(connect_options)
        .await?;

    Ok(DbPool { pool })
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Creates an isolated in-memory database with the schema applied.
///
/// Every call gets its own database. The pool holds a single connection that
/// never expires, so the database lives as long as the pool.
pub async fn create_memory_pool() -> Result<DbPool, DbError> {
    let db_url = format!(
        "sqlite:file:lab_portal_{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let db = create_pool_with_options(
        &db_url,
        PoolOptions {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            busy_timeout: Duration::from_secs(5),
        },
    )
    .await?;

    super::run_migrations(&db).await?;
    Ok(db)
}

impl DbPool {
    /// Wraps an existing SQLite pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the underlying SQLite pool.
    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, DbError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))
    }

    /// Starts a transaction that holds the write lock from its first
    /// statement (`BEGIN IMMEDIATE`).
    ///
    /// Use it for anything that reads and then writes. A deferred
    /// transaction that has already read cannot wait for the lock when it
    /// upgrades, and fails with `database is locked` instead.
    pub async fn begin_write(&self) -> Result<WriteTransaction, DbError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        Ok(WriteTransaction { conn: Some(conn) })
    }

    /// Checks if the database connection is healthy.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Returns pool statistics.
    pub fn pool_size(&self) -> u32 {
        self.pool.size()
    }

    /// Returns number of idle connections.
    pub fn idle_connections(&self) -> usize {
        self.pool.num_idle()
    }
}

/// A `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Dropping it without `commit` rolls back on a background task before the
/// connection goes back to the pool.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    /// Commits the transaction and releases the connection to the pool.
    pub async fn commit(mut self) -> Result<(), DbError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            roll_back(conn);
            return Err(DbError::Transaction(e.to_string()));
        }
        Ok(())
    }
}

fn roll_back(conn: PoolConnection<Sqlite>) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        // closing the connection rolls back as well
        warn!("No runtime to roll back on, closing connection");
        drop(conn.detach());
        return;
    };
    runtime.spawn(async move {
        let mut conn = conn;
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(error = %e, "Rollback failed, closing connection");
            drop(conn.detach());
        }
    });
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match &self.conn {
            Some(conn) => &**conn,
            None => unreachable!("write transaction used after commit"),
        }
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            Some(conn) => &mut **conn,
            None => unreachable!("write transaction used after commit"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            roll_back(conn);
        }
    }
}
