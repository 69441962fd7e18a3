//! Metadata store
//!
//! Single SQLite file in WAL mode behind a bounded pool: many concurrent
//! readers, writes serialised by SQLite itself. Every mutating function here
//! commits before returning; callers never observe partial writes.
//!
//! Uniqueness violations surface as `Duplicate`, foreign-key blocks as
//! `InUse`; both carry the entity name for the wire message.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod permissions;
pub mod pools;
pub mod sessions;
pub mod settings;
pub mod share_links;
pub mod snapshot_policies;
pub mod upload_sessions;
pub mod users;
pub mod zones;

/// Store-level error type
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("{0} is still referenced")]
    InUse(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl From<DbError> for depot_common::DepotError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => depot_common::DepotError::NotFound(what),
            DbError::Duplicate(what) => depot_common::DepotError::AlreadyExists(what),
            DbError::InUse(what) => depot_common::DepotError::InUse(what),
            DbError::Sqlx(e) => depot_common::DepotError::Storage(e.to_string()),
        }
    }
}

/// Classify an insert/update failure: unique-constraint hits become
/// `Duplicate`, foreign-key hits `InUse`, the rest pass through.
pub(crate) fn constraint_error(err: sqlx::Error, entity: &str) -> DbError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return DbError::Duplicate(entity.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return DbError::InUse(entity.to_string());
        }
    }
    DbError::Sqlx(err)
}

/// Open (creating if missing) the metadata database at `path`.
pub async fn connect(path: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Run the embedded migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// In-memory store for tests. Single connection: every handle must see the
/// same database.
pub async fn connect_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    migrate(&pool).await.map_err(sqlx::Error::from)?;

    Ok(pool)
}
