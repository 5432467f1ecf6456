//! Bounded worker pool for feed-cycles.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info_span, Instrument};

use crate::rss::cycle::FeedPipeline;
use crate::rss::types::Feed;
use crate::{Result, RssAggError};

/// Runs feed-cycles with at most `concurrency` in flight.
///
/// Dispatch is fire-and-forget: each cycle runs on its own task and reports
/// only through logs and [`IngestStats`](crate::rss::IngestStats).
#[derive(Clone)]
pub struct WorkerPool {
    pipeline: Arc<FeedPipeline>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool. `concurrency` must be positive.
    pub fn new(pipeline: Arc<FeedPipeline>, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(RssAggError::Validation(
                "worker concurrency must be positive".to_string(),
            ));
        }
        if u32::try_from(concurrency).is_err() || concurrency > Semaphore::MAX_PERMITS {
            return Err(RssAggError::Validation(format!(
                "worker concurrency {concurrency} is too large"
            )));
        }

        Ok(Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Get the concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Get the number of cycles currently running.
    pub fn active_workers(&self) -> usize {
        self.concurrency - self.semaphore.available_permits()
    }

    /// Hand a batch of feeds to the pool.
    ///
    /// Waits for a free slot before spawning each cycle, so a batch larger
    /// than the pool queues here rather than opening extra connections.
    /// Returns the number of cycles spawned.
    pub async fn dispatch(&self, feeds: Vec<Feed>) -> usize {
        let mut spawned = 0;

        for feed in feeds {
            let Some(permit) = self.acquire().await else {
                debug!("Worker pool closed, dropping remaining feeds");
                break;
            };

            let pipeline = self.pipeline.clone();
            let span = info_span!("feed_cycle", feed_id = feed.id, url = %feed.url);
            tokio::spawn(
                async move {
                    pipeline.run(&feed).await;
                    // Slot is released when the permit drops
                    drop(permit);
                }
                .instrument(span),
            );
            spawned += 1;
        }

        spawned
    }

    /// Wait until no cycle is running.
    pub async fn wait_idle(&self) {
        // `new` guarantees the limit fits in u32
        let all = self.concurrency as u32;
        if let Ok(permits) = self.semaphore.acquire_many(all).await {
            drop(permits);
        }
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }
}
