//! Dedup upserter.
//!
//! Persists parsed candidates for one feed. Deduplication is delegated to the
//! unique URL constraint in storage, so concurrent cycles over the same feed
//! (or different feeds syndicating the same article) can't create twins.

use tracing::{debug, error};

use crate::error::CycleError;
use crate::rss::store::FeedStore;
use crate::rss::types::{CandidatePost, CreatePostOutcome, NewPost};

/// Counts from one upsert pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Posts that were newly created.
    pub created: usize,
    /// Candidates whose URL was already stored.
    pub duplicates: usize,
}

/// Insert candidates in order, skipping URLs that already exist.
///
/// At most `max_items` candidates are attempted. The first storage error that
/// is not a duplicate URL aborts the pass; posts created before it stay
/// persisted and are reported in the error.
pub async fn upsert_posts(
    store: &dyn FeedStore,
    feed_id: i64,
    candidates: Vec<CandidatePost>,
    max_items: usize,
) -> Result<UpsertSummary, CycleError> {
    let mut summary = UpsertSummary::default();

    for candidate in candidates.into_iter().take(max_items) {
        let post = NewPost::from_candidate(feed_id, candidate);

        match store.create_post(&post).await {
            Ok(CreatePostOutcome::Created(id)) => {
                debug!(feed_id, post_id = id, url = %post.url, "Created post");
                summary.created += 1;
            }
            Ok(CreatePostOutcome::UniqueConflict) => {
                summary.duplicates += 1;
            }
            Err(e) => {
                error!(feed_id, url = %post.url, "Failed to store post: {}", e);
                return Err(CycleError::Persist {
                    created: summary.created,
                    duplicates: summary.duplicates,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}
