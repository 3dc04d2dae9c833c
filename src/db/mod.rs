use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub mod audit;
pub mod cargo;
pub mod contacts;
pub mod models;
pub mod stats;
pub mod users;
pub mod volunteers;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const SCHEMA: &str = include_str!("../../migrations/init.sql");

pub async fn init_pool(path: &str, max_size: u32) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.busy_timeout(Duration::from_secs(5))?;
        c.pragma_update(None, "foreign_keys", true)
    });
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(60))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    Ok(pool)
}

/// Applies the bundled schema. Every statement is idempotent.
pub async fn migrate(pool: &DbPool) -> anyhow::Result<()> {
    with_conn(pool, |conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await
}

/// Runs blocking SQLite work on the blocking pool with a pooled connection.
pub async fn with_conn<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<anyhow::Error> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get DB connection: {}", e))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| E::from(anyhow::anyhow!("DB task failed: {}", e)))?
}

/// True when `err` is a SQLite UNIQUE constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
