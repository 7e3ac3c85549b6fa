//! The consumer pool (C8): a fixed set of workers draining the job bus,
//! running each job through the fetcher (C3), parser (C4) and
//! normalizer (C6, which invokes the extractor C5 per entry), and
//! recording the outcome (§4.8).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use fp_bus::{Event, Job};
use fp_domain::model::FetchOutcome;
use fp_fetch::{FetchRequest, FetchResponse};

use crate::normalize;
use crate::shutdown::ShutdownHandle;
use crate::Pipeline;

/// Fixed-size worker pool. Sized off fetch concurrency so the pool
/// never holds more jobs in flight than the fetcher would admit
/// anyway, capped low enough that a handful of slow feeds can't starve
/// the rest of the queue.
pub struct ConsumerPool {
    pipeline: Arc<Pipeline>,
    worker_count: usize,
}

impl ConsumerPool {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let worker_count = pipeline.config.fetch.concurrency.min(5).max(1);
        Self { pipeline, worker_count }
    }

    /// Spawn every worker, returning their join handles so the caller
    /// can await a bounded drain on shutdown.
    pub fn spawn(&self, shutdown: ShutdownHandle) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.worker_count)
            .map(|worker_id| {
                let pipeline = self.pipeline.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(worker_id, pipeline, shutdown))
            })
            .collect()
    }
}

async fn worker_loop(worker_id: usize, pipeline: Arc<Pipeline>, mut shutdown: ShutdownHandle) {
    let pop_timeout = Duration::from_secs(1);

    loop {
        tokio::select! {
            job = pipeline.jobs.pop_timeout(pop_timeout) => {
                if let Some(job) = job {
                    process_job(&pipeline, job).await;
                } else if shutdown.is_shutdown() {
                    break;
                }
            }
            _ = shutdown.wait() => {
                break;
            }
        }
    }

    tracing::info!(worker_id, "consumer worker stopped");
}

/// Fetch, parse, normalize and persist the outcome of one job (§4.8).
/// Never panics: every failure path is represented in [`FetchOutcome`]
/// and logged, not propagated, since one bad feed must never take the
/// worker down.
async fn process_job(pipeline: &Pipeline, job: Job) {
    let feed = match pipeline.store.get_feed(job.feed_id).await {
        Ok(Some(feed)) => feed,
        Ok(None) => {
            tracing::debug!(feed_id = %job.feed_id, "feed no longer exists, discarding job");
            return;
        }
        Err(error) => {
            tracing::error!(feed_id = %job.feed_id, %error, "looking up feed for job");
            return;
        }
    };

    let now = Utc::now();
    let (response, elapsed_ms, byte_count) = pipeline
        .fetcher
        .fetch(
            &feed.per_host_key,
            FetchRequest {
                url: &feed.url,
                etag: feed.etag.as_deref(),
                last_modified: feed.last_modified.as_deref(),
            },
        )
        .await;

    let outcome = match response {
        FetchResponse::NotModified => {
            handle_not_modified(pipeline, feed.id, feed.etag.as_deref(), feed.last_modified.as_deref(), elapsed_ms, byte_count, now).await
        }
        FetchResponse::Ok { body, etag, last_modified } => {
            handle_ok(pipeline, &feed, body, etag, last_modified, elapsed_ms, byte_count, now).await
        }
        FetchResponse::Error { status, message } => {
            handle_transport_error(pipeline, feed.id, status, message, elapsed_ms, byte_count, now).await
        }
    };

    match &outcome {
        FetchOutcome::NotModified => {
            pipeline.events.publish(Event::FetchStatus {
                feed_id: feed.id,
                status: "not_modified".into(),
                message: None,
            });
        }
        FetchOutcome::Fetched { new_items } => {
            pipeline.events.publish(Event::FetchStatus {
                feed_id: feed.id,
                status: "ok".into(),
                message: None,
            });
            if *new_items > 0 {
                pipeline.events.publish(Event::NewItems {
                    feed_id: feed.id,
                    count: *new_items,
                });
            }
        }
        FetchOutcome::Error { message } => {
            pipeline.events.publish(Event::FetchStatus {
                feed_id: feed.id,
                status: "error".into(),
                message: Some(message.clone()),
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_not_modified(
    pipeline: &Pipeline,
    feed_id: Uuid,
    etag: Option<&str>,
    last_modified: Option<&str>,
    elapsed_ms: u128,
    byte_count: Option<u64>,
    now: chrono::DateTime<Utc>,
) -> FetchOutcome {
    match pipeline
        .store
        .record_fetch(feed_id, &[], etag, last_modified, 304, elapsed_ms as i64, byte_count.map(|b| b as i64), None, now)
        .await
    {
        Ok(_) => FetchOutcome::NotModified,
        Err(error) => {
            tracing::error!(feed_id = %feed_id, %error, "recording not-modified fetch");
            FetchOutcome::Error { message: error.to_string() }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_transport_error(
    pipeline: &Pipeline,
    feed_id: Uuid,
    status: u16,
    message: String,
    elapsed_ms: u128,
    byte_count: Option<u64>,
    now: chrono::DateTime<Utc>,
) -> FetchOutcome {
    if let Err(error) = pipeline
        .store
        .record_fetch(feed_id, &[], None, None, status as i32, elapsed_ms as i64, byte_count.map(|b| b as i64), Some(&message), now)
        .await
    {
        tracing::error!(feed_id = %feed_id, %error, "recording transport-error fetch");
    }
    FetchOutcome::Error { message }
}

#[allow(clippy::too_many_arguments)]
async fn handle_ok(
    pipeline: &Pipeline,
    feed: &fp_domain::model::Feed,
    body: Vec<u8>,
    etag: Option<String>,
    last_modified: Option<String>,
    elapsed_ms: u128,
    byte_count: Option<u64>,
    now: chrono::DateTime<Utc>,
) -> FetchOutcome {
    let parsed = match fp_feedparse::parse(&body) {
        Ok(parsed) => parsed,
        Err(error) => {
            let message = error.to_string();
            if let Err(store_error) = pipeline
                .store
                .record_fetch(feed.id, &[], None, None, 200, elapsed_ms as i64, byte_count.map(|b| b as i64), Some(&message), now)
                .await
            {
                tracing::error!(feed_id = %feed.id, error = %store_error, "recording unparseable fetch");
            }
            return FetchOutcome::Error { message };
        }
    };

    if let Some(title) = &parsed.title {
        if let Err(error) = pipeline.store.set_title_if_absent(feed.id, title, now).await {
            tracing::warn!(feed_id = %feed.id, %error, "setting discovered feed title");
        }
    }

    let existing_guids = match pipeline.store.existing_guids(feed.id).await {
        Ok(guids) => guids,
        Err(error) => {
            tracing::error!(feed_id = %feed.id, %error, "loading existing guids");
            return FetchOutcome::Error { message: error.to_string() };
        }
    };

    let mut seen_in_batch: HashSet<String> = HashSet::new();
    let mut new_items = Vec::new();

    for entry in &parsed.entries {
        let Some(guid) = normalize::derive_guid(entry) else {
            continue;
        };
        if existing_guids.contains(&guid) || !seen_in_batch.insert(guid.clone()) {
            continue;
        }

        let extracted = if pipeline.extractor.enabled() {
            match &entry.link {
                Some(url) => Some(pipeline.extractor.extract_url(&pipeline.fetcher, url).await),
                None => None,
            }
        } else {
            None
        };

        new_items.push(normalize::build_new_item(feed.id, guid, entry, extracted));
    }

    match pipeline
        .store
        .record_fetch(feed.id, &new_items, etag.as_deref(), last_modified.as_deref(), 200, elapsed_ms as i64, byte_count.map(|b| b as i64), None, now)
        .await
    {
        Ok(inserted) => FetchOutcome::Fetched { new_items: inserted },
        Err(error) => {
            tracing::error!(feed_id = %feed.id, %error, "recording fetch");
            FetchOutcome::Error { message: error.to_string() }
        }
    }
}
