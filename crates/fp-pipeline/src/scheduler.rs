//! The scheduler (C7): on a fixed tick, promotes due feeds onto the job
//! bus and pre-advances their `next_run_at` so a slow-to-dequeue job
//! never gets promoted twice (§4.7).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use fp_bus::Job;
use fp_domain::Result;

use crate::shutdown::ShutdownHandle;
use crate::Pipeline;

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// One promotion pass. Returns the number of feeds promoted.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let batch_size = self.pipeline.config.scheduler.batch_size;
        let due = self.pipeline.store.due_feeds(now, batch_size).await?;

        for feed in &due {
            let next_run_at = now + chrono::Duration::seconds(feed.interval_seconds);
            self.pipeline
                .store
                .advance_next_run(feed.id, next_run_at, now)
                .await?;
            self.pipeline.jobs.push(Job::new(feed.id, Some(feed.url.clone())));
        }

        Ok(due.len())
    }

    /// Run ticks on a fixed interval until `shutdown` fires.
    pub async fn run(self, mut shutdown: ShutdownHandle) {
        let tick_seconds = self.pipeline.config.scheduler.tick_seconds;
        let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(promoted) => tracing::debug!(promoted, "scheduler promoted due feeds"),
                        Err(error) => tracing::error!(%error, "scheduler tick failed"),
                    }
                }
                _ = shutdown.wait() => {
                    tracing::info!("scheduler stopping, no further ticks will fire");
                    break;
                }
            }
        }
    }
}
