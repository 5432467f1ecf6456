//! Feed ingestion pipeline.
//!
//! A scheduler selects the feeds least recently fetched on every tick and
//! hands them to a bounded worker pool. Each worker runs one feed-cycle:
//! fetch, parse, persist new posts, then advance the feed's freshness marker.

pub mod cycle;
pub mod fetcher;
pub mod ingestor;
pub mod parser;
pub mod pool;
pub mod repository;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod types;
pub mod upsert;

#[cfg(test)]
pub(crate) mod test_support;

pub use cycle::{CycleReport, CycleSettings, CycleState, FeedPipeline};
pub use fetcher::{validate_url, FeedSource, FetcherSettings, HttpFeedSource};
pub use ingestor::{start_ingestor, IngestSettings, IngestorHandle};
pub use parser::{parse_feed, parse_feed_with_limit};
pub use pool::WorkerPool;
pub use repository::{FeedRepository, PostRepository};
pub use scheduler::{Scheduler, DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL_SECS};
pub use stats::{IngestStats, IngestStatsSnapshot};
pub use store::FeedStore;
pub use types::{
    CandidatePost, CreatePostOutcome, Feed, NewFeed, NewPost, ParsedFeed, Post,
    MAX_DESCRIPTION_LENGTH, MAX_FEED_SIZE, MAX_ITEMS_PER_FEED,
};
pub use upsert::{upsert_posts, UpsertSummary};
