//! End-to-end exercise of the scheduler → job queue → consumer path,
//! the way `run_server` wires them together in `main.rs`, against a
//! throwaway on-disk database and an in-process HTTP stub standing in
//! for the upstream feed server.

use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fp_domain::Config;
use fp_pipeline::consumer::ConsumerPool;
use fp_pipeline::scheduler::Scheduler;
use fp_pipeline::Pipeline;

const FEED_BODY: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
<channel>
  <title>End To End Feed</title>
  <item>
    <guid>urn:e2e:1</guid>
    <title>First Post</title>
    <link>https://example.com/first</link>
    <description>Body of the first post</description>
  </item>
  <item>
    <guid>urn:e2e:2</guid>
    <title>Second Post</title>
    <link>https://example.com/second</link>
    <description>Body of the second post</description>
  </item>
</channel>
</rss>"#;

/// Poll `fp_store::list_items_for_feed` until it reports `want` items or
/// `timeout` elapses, returning the last read.
async fn wait_for_item_count(
    store: &fp_store::Store,
    feed_id: uuid::Uuid,
    want: usize,
    timeout: Duration,
) -> Vec<fp_domain::model::Item> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let items = store.list_items_for_feed(feed_id, 10).await.unwrap();
        if items.len() >= want || tokio::time::Instant::now() >= deadline {
            return items;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A feed that is due the moment it's inserted, fetched by a real
/// scheduler tick, processed by a real consumer worker, and visible in
/// the store afterwards — with no test code calling `process_job` or
/// `Scheduler::tick` directly.
#[tokio::test]
async fn scheduler_promotes_consumer_fetches_and_items_land_in_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_BODY))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.database_path = dir.path().join("feedpipe.db").to_string_lossy().into_owned();
    config.fetch.extraction_engine = "none".into();
    config.scheduler.tick_seconds = 1;

    let pipeline = std::sync::Arc::new(Pipeline::new(config).await.unwrap());

    let now = Utc::now();
    let feed = pipeline
        .store
        .insert_feed(&format!("{}/feed.xml", server.uri()), None, 900, now)
        .await
        .unwrap();

    let shutdown = pipeline.shutdown_handle();
    let scheduler = Scheduler::new(pipeline.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));
    let consumer_handles = ConsumerPool::new(pipeline.clone()).spawn(shutdown);

    let items = wait_for_item_count(&pipeline.store, feed.id, 2, Duration::from_secs(5)).await;
    assert_eq!(items.len(), 2, "both entries should have been fetched and persisted");

    let refreshed = pipeline.store.get_feed(feed.id).await.unwrap().unwrap();
    assert_eq!(refreshed.title.as_deref(), Some("End To End Feed"));
    assert_eq!(refreshed.last_status, Some(200));
    assert!(refreshed.next_run_at > now, "the scheduler must have pre-advanced next_run_at");

    pipeline.trigger_shutdown();
    scheduler_handle.await.unwrap();
    for handle in consumer_handles {
        handle.await.unwrap();
    }
}

/// A feed whose upstream is unreachable: the scheduler still promotes
/// it, the consumer still records a fetch-log entry and an error
/// event, and no items are written.
#[tokio::test]
async fn scheduler_promotes_failing_feed_and_consumer_records_error_without_items() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.database_path = dir.path().join("feedpipe.db").to_string_lossy().into_owned();
    config.fetch.extraction_engine = "none".into();
    config.scheduler.tick_seconds = 1;

    let pipeline = std::sync::Arc::new(Pipeline::new(config).await.unwrap());

    let now = Utc::now();
    let feed = pipeline
        .store
        .insert_feed("http://127.0.0.1:1/feed.xml", None, 900, now)
        .await
        .unwrap();

    let mut events = pipeline.events.subscribe();

    let shutdown = pipeline.shutdown_handle();
    let scheduler = Scheduler::new(pipeline.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));
    let consumer_handles = ConsumerPool::new(pipeline.clone()).spawn(shutdown);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let event = loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(envelope)) if envelope.type_name == "fetch_status" => break Some(envelope),
            Ok(Ok(_)) => continue,
            _ => break None,
        }
    };
    let event = event.expect("a fetch_status event should have been published");
    assert_eq!(event.data["status"], "error");

    assert!(pipeline.store.list_items_for_feed(feed.id, 10).await.unwrap().is_empty());

    pipeline.trigger_shutdown();
    scheduler_handle.await.unwrap();
    for handle in consumer_handles {
        handle.await.unwrap();
    }
}
