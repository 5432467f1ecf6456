//! Storage contract consumed by the ingestion pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{CreatePostOutcome, Feed, NewPost};
use crate::Result;

/// Narrow storage interface used by the scheduler and the feed-cycle.
///
/// Implementations must provide the atomicity the pipeline relies on: every
/// method is a single statement, and `create_post` reports a duplicate URL as
/// [`CreatePostOutcome::UniqueConflict`] rather than as an error.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Return up to `limit` feeds, never-fetched first, then by oldest
    /// `last_fetched_at`, ties broken by ascending id.
    async fn list_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>>;

    /// Advance the freshness marker of a feed.
    ///
    /// Returns `false` when the marker was left unchanged, either because the
    /// feed doesn't exist or because it already holds a later timestamp.
    async fn mark_feed_fetched(&self, feed_id: i64, fetched_at: DateTime<Utc>) -> Result<bool>;

    /// Insert a post unless its URL is already known.
    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome>;
}
