//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use schej_domain::{DatabaseConfig, Result, SchejError};
use tracing::info;

use super::pool::{create_sqlite_pool, SqliteConnection, SqlitePool, SqlitePoolConfig};
use crate::errors::InfraError;

pub const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that owns the connection pool.
pub struct DbManager {
    pool: SqlitePool,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let config = SqlitePoolConfig { max_size: pool_size.max(1), ..SqlitePoolConfig::default() };
        let pool = create_sqlite_pool(&path, &config)?;

        info!(db_path = %path.display(), max_connections = config.max_size, "sqlite pool initialised");

        Ok(Self { pool, path })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config.pool_size)
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get().map_err(|e| InfraError::from(e).into())
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection and run a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }

    /// Fold the WAL back into the main file before shutdown.
    pub fn close(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);").map_err(map_sql_error)?;
        info!(db_path = %self.path.display(), "database checkpointed for shutdown");
        Ok(())
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> SchejError {
    SchejError::from(InfraError::from(err))
}

pub(crate) fn map_json_error(err: serde_json::Error) -> SchejError {
    SchejError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: tokio::task::JoinError) -> SchejError {
    SchejError::Internal(format!("Task join error: {err}"))
}
