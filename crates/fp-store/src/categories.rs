use uuid::Uuid;

use fp_domain::model::Category;
use fp_domain::Result;

use crate::Store;

impl Store {
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        if let Some(existing) =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
        {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Category {
            id,
            name: name.to_owned(),
        })
    }

    pub async fn assign_feed_category(&self, feed_id: Uuid, category_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO feed_categories (feed_id, category_id) VALUES (?, ?)",
        )
        .bind(feed_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn categories_for_feed(&self, feed_id: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT c.* FROM categories c
             JOIN feed_categories fc ON fc.category_id = c.id
             WHERE fc.feed_id = ?
             ORDER BY c.name",
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn get_or_create_category_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store.get_or_create_category("tech").await.unwrap();
        let b = store.get_or_create_category("tech").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn assign_and_list_feed_categories() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store
            .insert_feed("https://example.com/feed.xml", None, 900, Utc::now())
            .await
            .unwrap();
        let tech = store.get_or_create_category("tech").await.unwrap();
        let news = store.get_or_create_category("news").await.unwrap();

        store.assign_feed_category(feed.id, tech.id).await.unwrap();
        store.assign_feed_category(feed.id, news.id).await.unwrap();

        let categories = store.categories_for_feed(feed.id).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "news");
        assert_eq!(categories[1].name, "tech");
    }
}
