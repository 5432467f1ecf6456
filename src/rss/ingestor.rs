//! Ingestion entry point.
//!
//! Wires the scheduler, worker pool and per-feed pipeline together and runs
//! them as one background task owned by the caller.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::rss::cycle::{CycleSettings, FeedPipeline};
use crate::rss::fetcher::FeedSource;
use crate::rss::pool::WorkerPool;
use crate::rss::scheduler::Scheduler;
use crate::rss::stats::{IngestStats, IngestStatsSnapshot};
use crate::rss::store::FeedStore;
use crate::{Result, RssAggError};

/// Parameters of a running ingestor.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Maximum number of feed-cycles in flight.
    pub concurrency: usize,
    /// Period between scheduler ticks.
    pub interval: Duration,
    /// Feeds selected per tick.
    pub batch_size: usize,
    /// Fire the first tick at start instead of after one interval.
    pub fetch_on_start: bool,
    pub cycle: CycleSettings,
}

impl IngestSettings {
    /// Settings for the given concurrency and tick interval.
    ///
    /// Each tick selects as many feeds as there are workers.
    pub fn new(concurrency: usize, interval: Duration) -> Self {
        Self {
            concurrency,
            interval,
            batch_size: concurrency,
            fetch_on_start: true,
            cycle: CycleSettings::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_fetch_on_start(mut self, fetch_on_start: bool) -> Self {
        self.fetch_on_start = fetch_on_start;
        self
    }

    pub fn with_cycle_settings(mut self, cycle: CycleSettings) -> Self {
        self.cycle = cycle;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(RssAggError::Validation(
                "tick interval must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RssAggError::Validation(
                "batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&IngestConfig> for IngestSettings {
    fn from(config: &IngestConfig) -> Self {
        Self::new(config.concurrency, Duration::from_secs(config.interval_secs))
            .with_batch_size(config.batch_size)
            .with_fetch_on_start(config.fetch_on_start)
            .with_cycle_settings(CycleSettings::from(config))
    }
}

/// Handle to a running ingestor.
pub struct IngestorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    pool: WorkerPool,
    stats: Arc<IngestStats>,
}

impl IngestorHandle {
    /// Current counters.
    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of feed-cycles currently running.
    pub fn active_workers(&self) -> usize {
        self.pool.active_workers()
    }

    /// Stop scheduling and wait up to `grace` for in-flight cycles.
    ///
    /// Returns `true` if every cycle finished in time. Cycles still running
    /// after the grace period are left to the runtime. Calling this again is
    /// harmless.
    pub async fn shutdown(&mut self, grace: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);

        let pool = self.pool.clone();
        let task = self.task.take();
        let drained = timeout(grace, async move {
            if let Some(task) = task {
                if let Err(e) = task.await {
                    error!("Feed scheduler task failed: {}", e);
                }
            }
            pool.wait_idle().await;
        })
        .await
        .is_ok();

        if drained {
            info!("Ingestor stopped");
        } else {
            warn!(
                "Ingestor stopped with {} feed cycle(s) still running",
                self.pool.active_workers()
            );
        }
        drained
    }
}

/// Start the ingestion pipeline on the current tokio runtime.
///
/// Runs until [`IngestorHandle::shutdown`] is called. Fails only on invalid
/// settings.
pub fn start_ingestor(
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    settings: IngestSettings,
) -> Result<IngestorHandle> {
    settings.validate()?;

    let stats = Arc::new(IngestStats::new());
    let pipeline = Arc::new(FeedPipeline::new(
        source,
        store.clone(),
        settings.cycle,
        stats.clone(),
    ));
    let pool = WorkerPool::new(pipeline, settings.concurrency)?;

    let scheduler = Scheduler::new(store, pool.clone(), stats.clone())
        .with_interval(settings.interval)
        .with_batch_size(settings.batch_size)
        .with_fetch_on_start(settings.fetch_on_start);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    Ok(IngestorHandle {
        shutdown_tx,
        task: Some(task),
        pool,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rss::test_support::{rss_document, MemoryStore, StaticSource};

    #[test]
    fn test_settings_new() {
        let settings = IngestSettings::new(4, Duration::from_secs(30));
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.batch_size, 4);
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert!(settings.fetch_on_start);
    }

    #[test]
    fn test_settings_from_config() {
        let config = IngestConfig {
            concurrency: 3,
            batch_size: 7,
            interval_secs: 120,
            fetch_on_start: false,
            max_items_per_feed: 25,
            ..IngestConfig::default()
        };
        let settings = IngestSettings::from(&config);
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.batch_size, 7);
        assert_eq!(settings.interval, Duration::from_secs(120));
        assert!(!settings.fetch_on_start);
        assert_eq!(settings.cycle.max_items_per_feed, 25);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_settings() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StaticSource::new());

        let zero_workers = IngestSettings::new(0, Duration::from_secs(1)).with_batch_size(1);
        assert!(start_ingestor(store.clone(), source.clone(), zero_workers).is_err());

        let zero_interval = IngestSettings::new(1, Duration::ZERO);
        assert!(start_ingestor(store, source, zero_interval).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingestor_runs_and_shuts_down() {
        let store = Arc::new(MemoryStore::new());
        let a = store.add_feed("https://feeds.test/a.xml", None);
        let b = store.add_feed("https://feeds.test/b.xml", None);
        let source = Arc::new(
            StaticSource::new()
                .with_body(
                    "https://feeds.test/a.xml",
                    rss_document(&["https://a.test/1", "https://a.test/2"]),
                )
                .with_body(
                    "https://feeds.test/b.xml",
                    rss_document(&["https://a.test/2", "https://b.test/3"]),
                ),
        );

        let mut handle = start_ingestor(
            store.clone(),
            source,
            IngestSettings::new(2, Duration::from_secs(60)),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = handle.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.cycles_succeeded, 2);
        assert_eq!(stats.posts_created, 3);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(store.post_count(), 3);
        assert_eq!(store.marks_for(a).len(), 1);
        assert_eq!(store.marks_for(b).len(), 1);

        assert!(handle.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_slow_cycles() {
        let store = Arc::new(MemoryStore::new());
        store.add_feed("https://feeds.test/slow.xml", None);
        let source = Arc::new(StaticSource::new().with_delay(Duration::from_secs(600)));

        let mut handle =
            start_ingestor(store, source, IngestSettings::new(1, Duration::from_secs(60)))
                .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.active_workers(), 1);

        assert!(!handle.shutdown(Duration::from_secs(1)).await);
    }
}
