//! r2d2 pool over SQLite
//!
//! Every pooled connection gets the same pragmas on open: WAL journaling,
//! foreign keys and a busy timeout so concurrent writers wait instead of
//! failing immediately.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use schej_domain::{Result, SchejError};
use tracing::warn;

use crate::errors::InfraError;

/// Pooled SQLite connection
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

/// Shared pool type
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Pool tuning
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: schej_domain::constants::DEFAULT_DATABASE_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Build a pool for the database file at `path`.
pub fn create_sqlite_pool(path: &Path, config: &SqlitePoolConfig) -> Result<SqlitePool> {
    let busy_timeout = config.busy_timeout;
    let manager = SqliteConnectionManager::file(path)
        .with_init(move |conn| apply_connection_pragmas(conn, busy_timeout));

    Pool::builder()
        .max_size(config.max_size.max(1))
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .map_err(|e| {
            warn!(db_path = %path.display(), error = %e, "failed to create connection pool");
            SchejError::from(InfraError::from(e))
        })
}

fn apply_connection_pragmas(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(busy_timeout)
}
