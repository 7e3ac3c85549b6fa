//! The persistent store (C1): an embedded SQLite database holding
//! feeds, items, read state, the fetch audit log, and categories.
//!
//! All reads and writes go through a pooled [`sqlx::SqlitePool`].
//! Schema changes live in `migrations/` and are applied forward-only at
//! [`Store::open`] time — there is no down-migration path.

mod categories;
mod feeds;
mod fetch_log;
mod items;

pub use categories::*;
pub use feeds::*;
pub use fetch_log::*;
pub use items::*;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use fp_domain::Result;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if absent) the database at `path` and run any
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(path, "store opened and migrated");

        Ok(Self { pool })
    }

    /// An in-memory store, used by tests and anywhere durability across
    /// process restarts is not required.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
