//! SQLite connection pool and schema migrations.

use crate::error::{DbError, Result};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;

/// Embedded migrations from `migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database handle shared by the stores.
#[derive(Debug, Clone)]
pub struct Db {
    pub sqlite: SqlitePool,
}

impl Db {
    /// Open (creating if needed) the database file and bring the schema up to date.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let sqlite = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DbError::SqliteConnect)?;

        MIGRATOR
            .run(&sqlite)
            .await
            .map_err(|error| DbError::Migration(error.to_string()))?;

        tracing::debug!(path = %path.display(), "database ready");

        Ok(Self { sqlite })
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.sqlite.close().await;
    }
}

/// Platform ids are unsigned snowflakes below 2^63; SQLite stores them as
/// signed 64-bit integers.
pub(crate) fn to_db_id(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db_id(id: i64) -> u64 {
    id as u64
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect");

    MIGRATOR
        .run(&pool)
        .await
        .expect("migrations should apply to an empty database");

    pool
}
