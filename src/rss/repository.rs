//! Feed and post repositories for rssagg.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::FeedStore;
use super::types::{CreatePostOutcome, Feed, NewFeed, NewPost, Post};
use crate::db::{Database, DbPool};
use crate::{Result, RssAggError};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

const POST_COLUMNS: &str =
    "id, title, description, url, published_at, feed_id, created_at, updated_at";

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| RssAggError::NotFound("feed".into()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let feed = sqlx::query_as::<_, Feed>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(feed)
    }

    /// List the feeds most overdue for a fetch.
    pub async fn list_to_fetch(&self, limit: usize) -> Result<Vec<Feed>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT $1
            "#
        );
        let feeds = sqlx::query_as::<_, Feed>(&query)
            .bind(limit as i64)
            .fetch_all(self.pool)
            .await?;

        Ok(feeds)
    }

    /// Advance `last_fetched_at`, never moving it backwards.
    pub async fn mark_fetched(&self, id: i64, fetched_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = $1,
                updated_at = $2
            WHERE id = $3
              AND (last_fetched_at IS NULL OR last_fetched_at < $4)
            "#,
        )
        .bind(fetched_at)
        .bind(Utc::now())
        .bind(id)
        .bind(fetched_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new post, ignoring it if the URL is already stored.
    ///
    /// The unique index on `posts.url` arbitrates between concurrent writers,
    /// so there is no read before the insert.
    pub async fn create_or_ignore(&self, post: &NewPost) -> Result<CreatePostOutcome> {
        let now = Utc::now();
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO posts (title, description, url, published_at, feed_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.url)
        .bind(post.published_at)
        .bind(post.feed_id)
        .bind(now)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(match inserted {
            Some(id) => CreatePostOutcome::Created(id),
            None => CreatePostOutcome::UniqueConflict,
        })
    }

    /// Get a post by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE url = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        Ok(post)
    }

    /// List posts of a feed, newest first.
    pub async fn list_by_feed(&self, feed_id: i64, limit: usize) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE feed_id = $1
            ORDER BY published_at DESC, id DESC
            LIMIT $2
            "#
        );
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(feed_id)
            .bind(limit as i64)
            .fetch_all(self.pool)
            .await?;

        Ok(posts)
    }

    /// Count all posts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Count posts of a feed.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl FeedStore for Database {
    async fn list_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>> {
        FeedRepository::new(self.pool()).list_to_fetch(limit).await
    }

    async fn mark_feed_fetched(&self, feed_id: i64, fetched_at: DateTime<Utc>) -> Result<bool> {
        FeedRepository::new(self.pool())
            .mark_fetched(feed_id, fetched_at)
            .await
    }

    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome> {
        PostRepository::new(self.pool()).create_or_ignore(post).await
    }
}
