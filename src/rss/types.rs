//! Feed and post types for rssagg.

use chrono::{DateTime, Utc};

/// Maximum length for a post description.
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// Maximum number of candidates persisted per feed-cycle.
pub const MAX_ITEMS_PER_FEED: usize = 100;

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// A subscribed syndication source.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Source URL of the RSS/Atom document.
    pub url: String,
    /// Owning user, `None` for shared feeds.
    pub user_id: Option<i64>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed row was last updated.
    pub updated_at: DateTime<Utc>,
    /// Start time of the latest fetch attempt; `None` if never fetched.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Feed {
    /// Whether the feed has never been fetched.
    pub fn is_never_fetched(&self) -> bool {
        self.last_fetched_at.is_none()
    }
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// Owning user.
    pub user_id: Option<i64>,
}

impl NewFeed {
    /// Create a new shared feed.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id: None,
        }
    }

    /// Set the owning user.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// One article ingested from a feed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    /// Post ID.
    pub id: i64,
    /// Post title (may be empty).
    pub title: String,
    /// Plain-text description.
    pub description: Option<String>,
    /// Canonical URL, unique across all posts.
    pub url: String,
    /// When the post was published.
    pub published_at: DateTime<Utc>,
    /// Feed the post was first ingested from.
    pub feed_id: i64,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Parsed, not-yet-persisted post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    /// Item title; empty when the document has none.
    pub title: String,
    /// Absolute canonical URL.
    pub url: String,
    /// Plain-text description.
    pub description: Option<String>,
    /// Published timestamp, or the fetch time when the item carries none.
    pub published_at: DateTime<Utc>,
}

/// Post insert request bound to a feed.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Feed ID.
    pub feed_id: i64,
    /// Post title.
    pub title: String,
    /// Canonical URL.
    pub url: String,
    /// Description.
    pub description: Option<String>,
    /// When the post was published.
    pub published_at: DateTime<Utc>,
}

impl NewPost {
    /// Create a new post request.
    pub fn new(
        feed_id: i64,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at,
        }
    }

    /// Bind a candidate to the feed it was parsed from.
    pub fn from_candidate(feed_id: i64, candidate: CandidatePost) -> Self {
        Self {
            feed_id,
            title: candidate.title,
            url: candidate.url,
            description: candidate.description,
            published_at: candidate.published_at,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let desc = description.into();
        if desc.chars().count() > MAX_DESCRIPTION_LENGTH {
            self.description = Some(desc.chars().take(MAX_DESCRIPTION_LENGTH).collect());
        } else {
            self.description = Some(desc);
        }
        self
    }
}

/// Result of a post insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePostOutcome {
    /// A new row was created.
    Created(i64),
    /// A post with the same URL already exists; nothing was written.
    UniqueConflict,
}

impl CreatePostOutcome {
    /// Whether a new row was created.
    pub fn is_created(&self) -> bool {
        matches!(self, CreatePostOutcome::Created(_))
    }
}

/// Parsed feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Feed title, if the document has one.
    pub title: Option<String>,
    /// Candidates in document order.
    pub items: Vec<CandidatePost>,
    /// Number of items dropped for lacking a usable link.
    pub skipped: usize,
}
