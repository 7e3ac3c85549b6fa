use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// A queued fetch job descriptor. Produced by the scheduler and the
/// control plane, consumed by the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub feed_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub url: Option<String>,
}

impl Job {
    pub fn new(feed_id: Uuid, url: Option<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            feed_id,
            scheduled_at: Utc::now(),
            url,
        }
    }
}

/// FIFO job queue with blocking-pop-with-timeout semantics, so consumers
/// remain cancellation-responsive (§5).
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<mpsc::UnboundedReceiver<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Push a job onto the queue. Never blocks.
    pub fn push(&self, job: Job) {
        // The receiver is held by this same struct for its lifetime, so
        // a send error here would mean the queue has been torn down —
        // nothing a caller can usefully react to beyond logging.
        if self.tx.send(job).is_err() {
            tracing::warn!("job queue receiver dropped, job discarded");
        }
    }

    /// Block-pop a job, waiting at most `timeout`. Returns `None` on
    /// timeout so a worker loop can re-check its cancellation token.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Job> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Jobs currently queued, for the `/v1/metrics` surface.
    pub fn depth(&self) -> usize {
        self.tx.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
