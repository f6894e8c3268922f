//! SQLite-backed persistence for spindle.
//!
//! [`Store`] wraps a connection pool; query modules hang operations off it
//! per entity. Rows are mapped to and from domain entities through the
//! explicit record structs in [`records`] — no runtime reflection.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use spindle_domain::Result;

pub mod generators;
pub mod migrations;
pub mod records;
pub mod stories;
pub mod suggestions;

/// Handle to the durable key/row store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (and create if missing) the database at `url` and bring the
    /// schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// An in-memory database, used by tests.
    ///
    /// Pinned to a single connection: every pool connection would
    /// otherwise get its own private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
