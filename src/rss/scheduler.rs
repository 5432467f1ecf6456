//! Feed freshness scheduler.
//!
//! On a fixed tick, asks storage for the feeds least recently fetched and
//! hands them to the worker pool.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::rss::pool::WorkerPool;
use crate::rss::stats::IngestStats;
use crate::rss::store::FeedStore;
use crate::rss::types::Feed;

/// Default tick interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default number of feeds selected per tick.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Periodic driver of the ingestion pipeline.
pub struct Scheduler {
    store: Arc<dyn FeedStore>,
    pool: WorkerPool,
    stats: Arc<IngestStats>,
    interval: Duration,
    batch_size: usize,
    fetch_on_start: bool,
}

impl Scheduler {
    /// Create a scheduler with the default interval and batch size, ticking
    /// immediately on start.
    pub fn new(store: Arc<dyn FeedStore>, pool: WorkerPool, stats: Arc<IngestStats>) -> Self {
        Self {
            store,
            pool,
            stats,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_on_start: true,
        }
    }

    /// Set the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the number of feeds selected per tick.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Choose whether the first tick fires at start or after one interval.
    pub fn with_fetch_on_start(mut self, fetch_on_start: bool) -> Self {
        self.fetch_on_start = fetch_on_start;
        self
    }

    /// Run the tick loop until `shutdown` turns `true` or its sender is
    /// dropped.
    ///
    /// A tick that is still handing feeds to a saturated pool delays the next
    /// one instead of bursting to catch up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Feed scheduler started (interval: {} seconds, batch size: {}, concurrency: {})",
            self.interval.as_secs(),
            self.batch_size,
            self.pool.concurrency()
        );

        let start = if self.fetch_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut timer = interval_at(start, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = timer.tick() => {
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        _ = self.tick() => {}
                    }
                }
            }
        }

        info!("Feed scheduler stopped");
    }

    /// Select one batch and dispatch it. Returns the number of cycles spawned.
    pub async fn tick(&self) -> usize {
        self.stats.record_tick();

        let feeds = match self.store.list_feeds_to_fetch(self.batch_size).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to list feeds to fetch: {}", e);
                return 0;
            }
        };

        let feeds = unique_by_id(feeds);
        if feeds.is_empty() {
            debug!("No feeds to fetch");
            return 0;
        }

        info!("Fetching {} feed(s)", feeds.len());
        self.pool.dispatch(feeds).await
    }
}

/// Drop repeated feeds so a feed is dispatched at most once per tick.
fn unique_by_id(feeds: Vec<Feed>) -> Vec<Feed> {
    let mut seen = HashSet::with_capacity(feeds.len());
    feeds.into_iter().filter(|f| seen.insert(f.id)).collect()
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rss::cycle::{CycleSettings, FeedPipeline};
    use crate::rss::test_support::{rss_document, MemoryStore, StaticSource};
    use chrono::{Duration as ChronoDuration, Utc};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn scheduler(store: Arc<MemoryStore>, source: StaticSource, batch_size: usize) -> Scheduler {
        let stats = Arc::new(IngestStats::new());
        let pipeline = Arc::new(FeedPipeline::new(
            Arc::new(source),
            store.clone(),
            CycleSettings::default(),
            stats.clone(),
        ));
        let pool = WorkerPool::new(pipeline, 4).unwrap();
        Scheduler::new(store, pool, stats)
            .with_interval(INTERVAL)
            .with_batch_size(batch_size)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_fires_immediately() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(store.clone(), StaticSource::new(), 10);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.list_calls(), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(store.list_calls(), 2);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let store = Arc::new(MemoryStore::new());
        let scheduler =
            scheduler(store.clone(), StaticSource::new(), 10).with_fetch_on_start(false);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.list_calls(), 0);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(store.list_calls(), 1);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_sender_dropped() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(store.clone(), StaticSource::new(), 10);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move { scheduler.run(rx).await });
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tick_selects_never_fetched_first() {
        let store = Arc::new(MemoryStore::new());
        let fetched = store.add_feed(
            "https://feeds.test/b.xml",
            Some(Utc::now() - ChronoDuration::minutes(10)),
        );
        let never = store.add_feed("https://feeds.test/a.xml", None);
        let source = StaticSource::new()
            .with_body("https://feeds.test/a.xml", rss_document(&["https://a.test/1"]));
        let scheduler = scheduler(store.clone(), source, 1);

        assert_eq!(scheduler.tick().await, 1);
        scheduler.pool.wait_idle().await;

        assert_eq!(store.marks_for(never).len(), 1);
        assert!(store.marks_for(fetched).is_empty());
        assert_eq!(scheduler.stats.snapshot().ticks, 1);
    }

    #[tokio::test]
    async fn test_tick_with_no_feeds() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(store.clone(), StaticSource::new(), 10);

        assert_eq!(scheduler.tick().await, 0);
        assert_eq!(store.list_calls(), 1);
    }

    #[test]
    fn test_unique_by_id() {
        let now = Utc::now();
        let feed = |id| Feed {
            id,
            name: String::new(),
            url: format!("https://feeds.test/{id}.xml"),
            user_id: None,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        };
        let feeds = unique_by_id(vec![feed(1), feed(2), feed(1)]);
        let ids: Vec<i64> = feeds.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
