use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fp_domain::model::{Item, NewItem, ReadState};
use fp_domain::Result;

use crate::Store;

impl Store {
    /// The compound per-feed-fetch write (§4.1, §4.6): bulk item
    /// upsert, feed metadata update, and fetch log append, all in one
    /// transaction so a failure partway through leaves no partial state.
    ///
    /// Returns the number of items that were actually new (duplicates
    /// on `(feed_id, guid)` are silently skipped).
    #[allow(clippy::too_many_arguments)]
    pub async fn record_fetch(
        &self,
        feed_id: Uuid,
        new_items: &[NewItem],
        etag: Option<&str>,
        last_modified: Option<&str>,
        http_status: i32,
        elapsed_ms: i64,
        byte_count: Option<i64>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for item in new_items {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO items
                    (id, feed_id, guid, title, url, image_url, content_html,
                     content_text, published_at, fetched_at, hash)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(item.feed_id)
            .bind(&item.guid)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.image_url)
            .bind(&item.content_html)
            .bind(&item.content_text)
            .bind(item.published_at)
            .bind(now)
            .bind(&item.hash)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        // `COALESCE(?, etag)` so an error outcome — which always passes
        // `None` here — leaves the feed's cached conditional-GET headers
        // untouched rather than wiping them to NULL (§4.3: "Do not update
        // caching headers" on anything but a 2xx response).
        sqlx::query(
            "UPDATE feeds
                SET etag = COALESCE(?, etag),
                    last_modified = COALESCE(?, last_modified),
                    last_status = ?, last_fetch_at = ?, updated_at = ?
              WHERE id = ?",
        )
        .bind(etag)
        .bind(last_modified)
        .bind(http_status)
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO fetch_log (id, feed_id, http_status, elapsed_ms, byte_count, error, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(feed_id)
        .bind(http_status)
        .bind(elapsed_ms)
        .bind(byte_count)
        .bind(error)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    /// The guids already on record for a feed, used by C8 to skip
    /// re-parsing and re-extracting entries it has already stored
    /// (§4.6) without waiting on `record_fetch`'s `INSERT OR IGNORE` to
    /// discover the duplicate after the fact.
    pub async fn existing_guids(&self, feed_id: Uuid) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT guid FROM items WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(guid,)| guid).collect())
    }

    pub async fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn list_items_for_feed(&self, feed_id: Uuid, limit: i64) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE feed_id = ? ORDER BY published_at DESC LIMIT ?",
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Delete every item across every feed (§4.9's `purge_all_items`).
    /// `read_state` rows cascade via the foreign key. Returns the number
    /// of rows removed.
    pub async fn purge_all_items(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM items").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn get_read_state(&self, item_id: Uuid) -> Result<Option<ReadState>> {
        let state = sqlx::query_as::<_, ReadState>("SELECT * FROM read_state WHERE item_id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(state)
    }

    pub async fn mark_read(&self, item_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO read_state (item_id, read_at, starred) VALUES (?, ?, 0)
             ON CONFLICT(item_id) DO UPDATE SET read_at = excluded.read_at",
        )
        .bind(item_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_starred(&self, item_id: Uuid, starred: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO read_state (item_id, read_at, starred) VALUES (?, NULL, ?)
             ON CONFLICT(item_id) DO UPDATE SET starred = excluded.starred",
        )
        .bind(item_id)
        .bind(starred)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
