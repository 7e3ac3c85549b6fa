use uuid::Uuid;

use fp_domain::model::FetchLog;
use fp_domain::Result;

use crate::Store;

impl Store {
    pub async fn list_fetch_log(&self, feed_id: Uuid, limit: i64) -> Result<Vec<FetchLog>> {
        let rows = sqlx::query_as::<_, FetchLog>(
            "SELECT * FROM fetch_log WHERE feed_id = ? ORDER BY occurred_at DESC LIMIT ?",
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fp_domain::model::NewItem;

    #[tokio::test]
    async fn list_fetch_log_returns_most_recent_first() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        let feed = store
            .insert_feed("https://example.com/feed.xml", None, 900, now)
            .await
            .unwrap();

        store
            .record_fetch(feed.id, &[] as &[NewItem], None, None, 200, 5, None, None, now)
            .await
            .unwrap();
        store
            .record_fetch(
                feed.id,
                &[] as &[NewItem],
                None,
                None,
                304,
                3,
                None,
                None,
                now + chrono::Duration::seconds(1),
            )
            .await
            .unwrap();

        let log = store.list_fetch_log(feed.id, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].http_status, 304);
        assert_eq!(log[1].http_status, 200);
    }
}
