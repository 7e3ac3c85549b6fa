//! The control plane (C9): the handful of operator actions that don't
//! fit the scheduler's own rhythm — enqueue a feed right now, wipe
//! stored items, and OPML import/export (§4.9).

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use fp_bus::Job;
use fp_domain::{Error, Result};

use crate::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct PurgeOutcome {
    pub items_deleted: u64,
    pub feeds_requeued: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub feeds_created: usize,
    pub feeds_skipped: usize,
    pub errors: Vec<String>,
}

impl Pipeline {
    /// Enqueue an immediate refresh of one feed (§4.9). Idempotent: a
    /// feed already mid-fetch simply gets a second job behind the
    /// first, not a duplicate fetch in flight.
    pub async fn enqueue_now(&self, feed_id: Uuid) -> Result<()> {
        let Some(feed) = self.store.get_feed(feed_id).await? else {
            return Err(Error::Other(format!("feed {feed_id} not found")));
        };
        let now = Utc::now();
        self.store.advance_next_run(feed.id, now, now).await?;
        self.jobs.push(Job::new(feed.id, Some(feed.url)));
        Ok(())
    }

    /// Delete every stored item and re-enqueue every feed for an
    /// immediate refresh (§4.9). The delete is the primary effect — a
    /// feed that fails to re-enqueue is recorded as a warning, not
    /// rolled back, so one bad feed can't undo the purge for everyone
    /// else.
    pub async fn purge_all_items(&self) -> Result<PurgeOutcome> {
        let items_deleted = self.store.purge_all_items().await?;
        let now = Utc::now();
        let feeds = self.store.list_feeds().await?;

        let mut warnings = Vec::new();
        let mut feeds_requeued = 0usize;
        for feed in &feeds {
            if let Err(error) = self.store.advance_next_run(feed.id, now, now).await {
                warnings.push(format!("feed {}: {error}", feed.id));
                continue;
            }
            self.jobs.push(Job::new(feed.id, Some(feed.url.clone())));
            feeds_requeued += 1;
        }

        Ok(PurgeOutcome { items_deleted, feeds_requeued, warnings })
    }

    /// Import feeds from an OPML 2.0 document (§4.9). Feeds whose URL
    /// is already subscribed are skipped; a bad outline does not stop
    /// the rest of the batch.
    pub async fn import_feeds(&self, opml_text: &str) -> Result<ImportOutcome> {
        let document: opml::OPML = opml_text
            .parse()
            .map_err(|e| Error::Other(format!("parsing OPML: {e}")))?;

        let mut outcome = ImportOutcome::default();
        let now = Utc::now();
        let default_interval = self.config.fetch.default_interval_seconds;
        self.import_outlines(&document.body.outlines, &mut outcome, now, default_interval)
            .await;
        Ok(outcome)
    }

    fn import_outlines<'a>(
        &'a self,
        outlines: &'a [opml::Outline],
        outcome: &'a mut ImportOutcome,
        now: chrono::DateTime<Utc>,
        default_interval: i64,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            for outline in outlines {
                if let Some(xml_url) = outline.xml_url.as_deref() {
                    match self.store.get_feed_by_url(xml_url).await {
                        Ok(Some(_)) => outcome.feeds_skipped += 1,
                        Ok(None) => {
                            let title = outline
                                .title
                                .as_deref()
                                .filter(|t| !t.is_empty())
                                .or_else(|| Some(outline.text.as_str()).filter(|t| !t.is_empty()));
                            match self
                                .store
                                .insert_feed(xml_url, title, default_interval, now + Duration::seconds(5))
                                .await
                            {
                                Ok(_) => outcome.feeds_created += 1,
                                Err(error) => outcome.errors.push(format!("{xml_url}: {error}")),
                            }
                        }
                        Err(error) => outcome.errors.push(format!("{xml_url}: {error}")),
                    }
                }
                self.import_outlines(&outline.outlines, outcome, now, default_interval).await;
            }
        })
    }

    /// Render every subscribed feed as an OPML 2.0 document, ordered by
    /// title (feeds without one sort last, then by URL) (§4.9).
    pub async fn export_feeds(&self) -> Result<String> {
        let mut feeds = self.store.list_feeds().await?;
        feeds.sort_by(|a, b| match (&a.title, &b.title) {
            (Some(t1), Some(t2)) => t1.cmp(t2).then_with(|| a.url.cmp(&b.url)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.url.cmp(&b.url),
        });

        let mut document = opml::OPML::default();
        document.body.outlines = feeds
            .iter()
            .map(|feed| opml::Outline {
                text: feed.title.clone().unwrap_or_else(|| feed.url.clone()),
                title: feed.title.clone(),
                r#type: Some("rss".to_owned()),
                xml_url: Some(feed.url.clone()),
                ..opml::Outline::default()
            })
            .collect();

        document
            .to_string()
            .map_err(|e| Error::Other(format!("rendering OPML: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_domain::Config;
    use std::sync::Arc;

    async fn pipeline_with(db_path: &std::path::Path) -> Arc<Pipeline> {
        let mut config = Config::default();
        config.store.database_path = db_path.to_string_lossy().into_owned();
        Arc::new(Pipeline::new(config).await.unwrap())
    }

    #[tokio::test]
    async fn enqueue_now_pushes_a_job_and_advances_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(&dir.path().join("feedpipe.db")).await;
        let now = Utc::now();
        let feed = pipeline
            .store
            .insert_feed("https://example.com/feed.xml", None, 900, now + Duration::hours(1))
            .await
            .unwrap();

        pipeline.enqueue_now(feed.id).await.unwrap();

        let job = pipeline
            .jobs
            .pop_timeout(std::time::Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(job.feed_id, feed.id);

        let refreshed = pipeline.store.get_feed(feed.id).await.unwrap().unwrap();
        assert!(refreshed.next_run_at <= Utc::now());
    }

    #[tokio::test]
    async fn enqueue_now_errors_for_unknown_feed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(&dir.path().join("feedpipe.db")).await;
        assert!(pipeline.enqueue_now(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn purge_all_items_deletes_and_requeues_every_feed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(&dir.path().join("feedpipe.db")).await;
        let now = Utc::now();
        let feed = pipeline
            .store
            .insert_feed("https://example.com/feed.xml", None, 900, now)
            .await
            .unwrap();
        let items = vec![fp_domain::model::NewItem {
            feed_id: feed.id,
            guid: "guid-1".into(),
            title: None,
            url: None,
            image_url: None,
            content_html: None,
            content_text: None,
            published_at: None,
            hash: "h".into(),
        }];
        pipeline.store.record_fetch(feed.id, &items, None, None, 200, 1, None, None, now).await.unwrap();

        let outcome = pipeline.purge_all_items().await.unwrap();
        assert_eq!(outcome.items_deleted, 1);
        assert_eq!(outcome.feeds_requeued, 1);
        assert!(pipeline.store.list_items_for_feed(feed.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_feeds_creates_new_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(&dir.path().join("feedpipe.db")).await;
        pipeline
            .store
            .insert_feed("https://existing.example.com/feed.xml", Some("Existing"), 900, Utc::now())
            .await
            .unwrap();

        let opml_text = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="Existing" xmlUrl="https://existing.example.com/feed.xml"/>
    <outline text="New Feed" xmlUrl="https://new.example.com/feed.xml"/>
  </body>
</opml>"#;

        let outcome = pipeline.import_feeds(opml_text).await.unwrap();
        assert_eq!(outcome.feeds_created, 1);
        assert_eq!(outcome.feeds_skipped, 1);
        assert!(outcome.errors.is_empty());

        let feeds = pipeline.store.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 2);
    }

    #[tokio::test]
    async fn export_feeds_orders_by_title_then_url() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(&dir.path().join("feedpipe.db")).await;
        let now = Utc::now();
        pipeline.store.insert_feed("https://b.example.com/feed.xml", Some("Beta"), 900, now).await.unwrap();
        pipeline.store.insert_feed("https://a.example.com/feed.xml", Some("Alpha"), 900, now).await.unwrap();
        pipeline.store.insert_feed("https://c.example.com/feed.xml", None, 900, now).await.unwrap();

        let exported = pipeline.export_feeds().await.unwrap();
        let alpha_pos = exported.find("Alpha").unwrap();
        let beta_pos = exported.find("Beta").unwrap();
        let c_pos = exported.find("c.example.com").unwrap();
        assert!(alpha_pos < beta_pos);
        assert!(beta_pos < c_pos);
    }
}
