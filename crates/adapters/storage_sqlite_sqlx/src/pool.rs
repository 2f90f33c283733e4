//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::error::StorageError;
use crate::fallback_store::SqliteFallbackStore;

/// Configuration for the `SQLite` storage adapter.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:domisafe.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self.database_url).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn initialize(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::debug!(database_url, "fallback database ready");
        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fallback store sharing this pool.
    #[must_use]
    pub fn fallback_store(&self) -> SqliteFallbackStore {
        SqliteFallbackStore::new(self.pool.clone())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
