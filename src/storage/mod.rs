//! SQLite storage layer -- schema, the result store, and its query filters.

pub mod error;
pub mod filter;
pub mod results;
pub mod schema;

pub use self::error::{StoreError, StoreResult};
pub use self::filter::{Clause, ResultFilter};
pub use self::results::{NewOperationResult, OperationResult, PagedResults, ResultStore, SqliteStore};

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Storage settings, threaded explicitly into [`SqliteStore::open`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Upper bound for the stored `output` column, in bytes.
    pub max_output_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./cronlog-store.db"),
            busy_timeout_ms: 5000,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Open (or create) the SQLite database and return a connection pool.
///
/// The schema bootstrap runs once here, on a single connection, before the
/// pool is handed out.
pub fn open_pool(config: &StoreConfig) -> Result<Pool> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(&config.db_path).with_init(move |c| {
        c.busy_timeout(busy_timeout)?;
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )
    });

    let pool = R2D2Pool::new(manager)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let conn = pool.get()?;
    schema::migrate(&conn).context("failed to bootstrap database schema")?;

    Ok(pool)
}

/// Single-connection in-memory pool. Every SQLite `:memory:` connection is a
/// separate database, so the pool must never grow past one nor recycle it.
pub fn open_memory_pool() -> Result<Pool> {
    let manager = SqliteConnectionManager::memory();
    let pool = R2D2Pool::builder()
        .max_size(1)
        .max_lifetime(None)
        .idle_timeout(None)
        .build(manager)?;

    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_pool_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: dir.path().join("results.db"),
            ..StoreConfig::default()
        };

        let pool = open_pool(&config).unwrap();
        assert!(config.db_path.exists());

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM opresults", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_pool_twice_on_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: dir.path().join("results.db"),
            ..StoreConfig::default()
        };

        open_pool(&config).unwrap();
        open_pool(&config).unwrap();
    }
}
