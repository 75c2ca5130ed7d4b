//! Database connection and repositories

pub mod error;
pub mod items;
pub mod query;
pub mod schema;
pub mod sqlite_helpers;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use error::RepositoryError;
pub use items::{ItemCreate, ItemRecord, ItemsRepository};
pub use users::{UserCreate, UserRecord, UsersRepository};

/// Database wrapper providing connection pool access.
///
/// Created once at startup and cloned into every handler; repositories borrow
/// a connection per query and give it back on drop.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    /// Create a new database connection pool
    pub async fn connect(url: &str, max_connections: u32, bcrypt_cost: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(dir) = options.get_filename().parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, bcrypt_cost))
    }

    /// In-memory database with the schema applied.
    ///
    /// Every pooled connection to `:memory:` would get its own empty database,
    /// so the pool is pinned to a single connection that never expires.
    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        schema::ensure_schema(&pool).await?;
        Ok(Self::new(pool, 4))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a users repository
    pub fn users(&self) -> UsersRepository {
        UsersRepository::new(self.pool.clone(), self.bcrypt_cost)
    }

    /// Get an items repository
    pub fn items(&self) -> ItemsRepository {
        ItemsRepository::new(self.pool.clone())
    }

    /// Create missing tables
    pub async fn migrate(&self) -> Result<()> {
        schema::ensure_schema(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
