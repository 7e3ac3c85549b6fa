//! Wires the store, job bus, fetcher, extractor and event bus into the
//! single value the scheduler (C7), consumer pool (C8) and control
//! plane (C9) all share.
//!
//! There is exactly one [`Pipeline`] per running process, constructed
//! once at startup and passed around as an `Arc`. Unlike the teacher's
//! module-level singletons, nothing here is reachable except through
//! this value — a second `Pipeline` in the same process is simply a
//! second, independent pipeline.

pub mod consumer;
pub mod control;
pub mod normalize;
pub mod scheduler;
pub mod shutdown;

use std::sync::Arc;

use fp_bus::{EventBus, JobQueue};
use fp_domain::{Config, Result};
use fp_extract::ContentExtractor;
use fp_fetch::Fetcher;
use fp_store::Store;

use shutdown::{ShutdownHandle, ShutdownSignal};

pub struct Pipeline {
    pub store: Arc<Store>,
    pub jobs: Arc<JobQueue>,
    pub events: Arc<EventBus>,
    pub fetcher: Arc<Fetcher>,
    pub extractor: Arc<ContentExtractor>,
    pub config: Arc<Config>,
    shutdown_signal: ShutdownSignal,
    shutdown_handle: ShutdownHandle,
}

impl Pipeline {
    /// Open the store (running migrations) and build every other
    /// subsystem from `config`. Fallible only because opening the store
    /// can fail; everything else is infallible construction.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(Store::open(&config.store.database_path).await?);
        let jobs = Arc::new(JobQueue::new());
        let events = Arc::new(EventBus::default());
        let fetcher = Arc::new(Fetcher::new(
            std::time::Duration::from_secs(config.fetch.timeout_seconds),
            config.fetch.concurrency,
            config.fetch.per_host_concurrency,
            config.fetch.user_agent.clone(),
        ));
        let extractor = Arc::new(ContentExtractor::new(&config.fetch.extraction_engine));
        let (shutdown_signal, shutdown_handle) = ShutdownSignal::new();

        Ok(Self {
            store,
            jobs,
            events,
            fetcher,
            extractor,
            config: Arc::new(config),
            shutdown_signal,
            shutdown_handle,
        })
    }

    /// A fresh handle observing this pipeline's shutdown signal. Every
    /// scheduler tick loop and consumer worker gets its own clone.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Trigger a graceful shutdown. Idempotent.
    pub fn trigger_shutdown(&self) {
        self.shutdown_signal.trigger();
    }
}
