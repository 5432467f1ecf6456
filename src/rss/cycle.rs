//! Per-feed pipeline.
//!
//! One feed-cycle drives a single feed through fetch, parse and persist, then
//! advances its freshness marker. Every outcome is contained here: nothing a
//! cycle does can fail the scheduler or a sibling cycle.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn};

use crate::config::IngestConfig;
use crate::error::CycleError;
use crate::rss::fetcher::FeedSource;
use crate::rss::parser::parse_feed_with_limit;
use crate::rss::stats::IngestStats;
use crate::rss::store::FeedStore;
use crate::rss::types::{Feed, MAX_DESCRIPTION_LENGTH, MAX_ITEMS_PER_FEED};
use crate::rss::upsert::{upsert_posts, UpsertSummary};

/// Lifecycle of one feed-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Pending,
    Fetching,
    Parsing,
    Persisting,
    Done,
    Failed,
}

impl CycleState {
    /// Whether the cycle has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Any non-terminal state may fail; otherwise the cycle moves strictly
    /// forward.
    pub fn can_transition_to(self, next: CycleState) -> bool {
        use CycleState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Pending, Fetching) | (Fetching, Parsing) | (Parsing, Persisting) => true,
            (Persisting, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Pending => "pending",
            CycleState::Fetching => "fetching",
            CycleState::Parsing => "parsing",
            CycleState::Persisting => "persisting",
            CycleState::Done => "done",
            CycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Limits applied inside a feed-cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    pub max_items_per_feed: usize,
    pub max_description_length: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            max_items_per_feed: MAX_ITEMS_PER_FEED,
            max_description_length: MAX_DESCRIPTION_LENGTH,
        }
    }
}

impl From<&IngestConfig> for CycleSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_items_per_feed: config.max_items_per_feed,
            max_description_length: config.max_description_length,
        }
    }
}

/// Outcome of one feed-cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub feed_id: i64,
    /// Cycle start time; also the value written to the freshness marker.
    pub started_at: DateTime<Utc>,
    /// Terminal state, `Done` or `Failed`.
    pub state: CycleState,
    pub summary: UpsertSummary,
    /// Items dropped by the parser.
    pub skipped: usize,
    pub error: Option<CycleError>,
    /// Whether the freshness marker moved.
    pub marked: bool,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.state == CycleState::Done
    }
}

/// Shared, stateless driver for feed-cycles.
pub struct FeedPipeline {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn FeedStore>,
    settings: CycleSettings,
    stats: Arc<IngestStats>,
}

impl FeedPipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn FeedStore>,
        settings: CycleSettings,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Run one feed-cycle to completion.
    ///
    /// The freshness marker is written exactly once, after the cycle reaches
    /// `Done` or `Failed`, with the time the cycle started.
    pub async fn run(&self, feed: &Feed) -> CycleReport {
        let started_at = Utc::now();
        let mut state = CycleState::Pending;
        let mut skipped = 0;

        self.stats.cycle_started();

        let result = self
            .execute(feed, started_at, &mut state, &mut skipped)
            .await;

        let (summary, error) = match result {
            Ok(summary) => {
                advance(&mut state, CycleState::Done);
                (summary, None)
            }
            Err(e) => {
                advance(&mut state, CycleState::Failed);
                let summary = match &e {
                    CycleError::Persist {
                        created,
                        duplicates,
                        ..
                    } => UpsertSummary {
                        created: *created,
                        duplicates: *duplicates,
                    },
                    _ => UpsertSummary::default(),
                };
                (summary, Some(e))
            }
        };

        let marked = match self.store.mark_feed_fetched(feed.id, started_at).await {
            Ok(marked) => marked,
            Err(e) => {
                error!(feed_id = feed.id, "Failed to mark feed fetched: {}", e);
                false
            }
        };

        self.stats.record_posts(summary.created, summary.duplicates);
        self.stats.cycle_finished(error.is_none());

        match &error {
            None if summary.created > 0 => info!(
                feed_id = feed.id,
                "Feed updated: {} new post(s), {} duplicate(s)",
                summary.created,
                summary.duplicates
            ),
            None => debug!(feed_id = feed.id, "Feed updated: no new posts"),
            Some(e) => debug!(feed_id = feed.id, "Feed cycle failed: {}", e),
        }

        CycleReport {
            feed_id: feed.id,
            started_at,
            state,
            summary,
            skipped,
            error,
            marked,
        }
    }

    async fn execute(
        &self,
        feed: &Feed,
        started_at: DateTime<Utc>,
        state: &mut CycleState,
        skipped: &mut usize,
    ) -> Result<UpsertSummary, CycleError> {
        advance(state, CycleState::Fetching);
        let body = self.source.fetch(&feed.url).await.map_err(|e| {
            warn!(feed_id = feed.id, url = %feed.url, "Failed to fetch feed: {}", e);
            CycleError::from(e)
        })?;

        advance(state, CycleState::Parsing);
        let parsed = parse_feed_with_limit(
            &body,
            &feed.url,
            started_at,
            self.settings.max_description_length,
        )
        .map_err(|e| {
            warn!(feed_id = feed.id, url = %feed.url, "Failed to parse feed: {}", e);
            CycleError::from(e)
        })?;

        *skipped = parsed.skipped;
        if parsed.skipped > 0 {
            debug!(
                feed_id = feed.id,
                "Skipped {} item(s) without a usable link", parsed.skipped
            );
        }

        advance(state, CycleState::Persisting);
        upsert_posts(
            self.store.as_ref(),
            feed.id,
            parsed.items,
            self.settings.max_items_per_feed,
        )
        .await
    }
}

fn advance(state: &mut CycleState, next: CycleState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal cycle transition {state} -> {next}"
    );
    trace!("cycle {} -> {}", state, next);
    *state = next;
}
