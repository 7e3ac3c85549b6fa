use chrono::{DateTime, Utc};
use uuid::Uuid;

use fp_domain::{model::Feed, Result};

use crate::Store;

impl Store {
    pub async fn get_feed(&self, id: Uuid) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>("SELECT * FROM feeds ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    /// Feeds due for a fetch as of `now`, oldest-due first, capped at
    /// `limit` rows (§4.7, the scheduler's due-list read).
    pub async fn due_feeds(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT * FROM feeds WHERE next_run_at <= ? ORDER BY next_run_at ASC, id ASC LIMIT ?",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Insert a feed newly subscribed by the user or an OPML import.
    /// `next_run_at` is set to `now` so it is eligible for the very next
    /// scheduler tick.
    pub async fn insert_feed(
        &self,
        url: &str,
        title: Option<&str>,
        interval_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<Feed> {
        let id = Uuid::new_v4();
        let per_host_key = Feed::host_key_for(url);

        sqlx::query(
            "INSERT INTO feeds
                (id, url, title, etag, last_modified, last_fetch_at, last_status,
                 next_run_at, interval_seconds, per_host_key, created_at, updated_at)
             VALUES (?, ?, ?, NULL, NULL, NULL, NULL, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(url)
        .bind(title)
        .bind(now)
        .bind(interval_seconds)
        .bind(&per_host_key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Feed {
            id,
            url: url.to_owned(),
            title: title.map(str::to_owned),
            etag: None,
            last_modified: None,
            last_fetch_at: None,
            last_status: None,
            next_run_at: now,
            interval_seconds,
            per_host_key,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fill in a feed's title from its first successfully parsed feed
    /// document (§4.6), when the feed was subscribed without one (e.g.
    /// an OPML import that only carried a URL). A no-op once a title is
    /// already on record, so a feed's own re-titling never overwrites a
    /// name the user may have edited by hand.
    pub async fn set_title_if_absent(
        &self,
        id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET title = ?, updated_at = ? WHERE id = ? AND title IS NULL")
            .bind(title)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_feed(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Advance a feed's `next_run_at` without waiting for a fetch result
    /// (the scheduler does this at promotion time — §4.7 — so a feed
    /// that dequeues slowly is never re-promoted twice).
    pub async fn advance_next_run(
        &self,
        id: Uuid,
        next_run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET next_run_at = ?, updated_at = ? WHERE id = ?")
            .bind(next_run_at)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use chrono::Duration;

    #[tokio::test]
    async fn insert_and_get_feed_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let feed = store
            .insert_feed("https://example.com/feed.xml", Some("Example"), 900, now)
            .await
            .unwrap();

        let fetched = store.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(fetched.url, "https://example.com/feed.xml");
        assert_eq!(fetched.per_host_key, "example.com");
        assert_eq!(fetched.title.as_deref(), Some("Example"));
    }

    #[tokio::test]
    async fn due_feeds_respects_next_run_at_and_limit() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let past = now - Duration::seconds(10);
        let future = now + Duration::seconds(600);

        let due_a = store
            .insert_feed("https://a.example.com/feed", None, 900, past)
            .await
            .unwrap();
        store
            .insert_feed("https://b.example.com/feed", None, 900, future)
            .await
            .unwrap();
        let due_c = store
            .insert_feed("https://c.example.com/feed", None, 900, past)
            .await
            .unwrap();

        let due = store.due_feeds(now, 10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|f| f.id).collect();
        assert!(ids.contains(&due_a.id));
        assert!(ids.contains(&due_c.id));
        assert_eq!(due.len(), 2);
    }

    #[tokio::test]
    async fn set_title_if_absent_only_fills_a_missing_title() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let feed = store
            .insert_feed("https://example.com/feed.xml", None, 900, now)
            .await
            .unwrap();

        store.set_title_if_absent(feed.id, "Discovered Title", now).await.unwrap();
        let refreshed = store.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(refreshed.title.as_deref(), Some("Discovered Title"));

        store.set_title_if_absent(feed.id, "Second Title", now).await.unwrap();
        let refreshed = store.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(refreshed.title.as_deref(), Some("Discovered Title"));
    }

    #[tokio::test]
    async fn delete_feed_cascades_are_left_to_sqlite_fk() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store
            .insert_feed("https://example.com/feed.xml", None, 900, Utc::now())
            .await
            .unwrap();
        assert!(store.delete_feed(feed.id).await.unwrap());
        assert!(store.get_feed(feed.id).await.unwrap().is_none());
        assert!(!store.delete_feed(feed.id).await.unwrap());
    }
}
