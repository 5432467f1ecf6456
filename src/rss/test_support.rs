//! In-memory fakes for pipeline unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{FetchError, RssAggError};
use crate::rss::fetcher::FeedSource;
use crate::rss::store::FeedStore;
use crate::rss::types::{CreatePostOutcome, Feed, NewPost};
use crate::Result;

#[derive(Default)]
struct StoreState {
    feeds: Vec<Feed>,
    posts: Vec<NewPost>,
    marks: Vec<(i64, DateTime<Utc>)>,
    list_calls: usize,
    fail_posts_after: Option<usize>,
}

/// `FeedStore` backed by vectors behind a mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feed(&self, url: &str, last_fetched_at: Option<DateTime<Utc>>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.feeds.len() as i64 + 1;
        let now = Utc::now();
        state.feeds.push(Feed {
            id,
            name: format!("feed {id}"),
            url: url.to_string(),
            user_id: None,
            created_at: now,
            updated_at: now,
            last_fetched_at,
        });
        id
    }

    pub fn feed(&self, id: i64) -> Option<Feed> {
        let state = self.state.lock().unwrap();
        state.feeds.iter().find(|f| f.id == id).cloned()
    }

    /// Make `create_post` fail for new URLs once `n` posts have been stored.
    /// Duplicate URLs still report a conflict.
    pub fn fail_posts_after(&self, n: usize) {
        self.state.lock().unwrap().fail_posts_after = Some(n);
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub fn marks_for(&self, feed_id: i64) -> Vec<DateTime<Utc>> {
        let state = self.state.lock().unwrap();
        state
            .marks
            .iter()
            .filter(|(id, _)| *id == feed_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn list_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        let mut feeds = state.feeds.clone();
        feeds.sort_by_key(|f| (f.last_fetched_at, f.id));
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn mark_feed_fetched(&self, feed_id: i64, fetched_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.marks.push((feed_id, fetched_at));
        let Some(feed) = state.feeds.iter_mut().find(|f| f.id == feed_id) else {
            return Ok(false);
        };
        if feed.last_fetched_at.is_some_and(|at| at >= fetched_at) {
            return Ok(false);
        }
        feed.last_fetched_at = Some(fetched_at);
        Ok(true)
    }

    async fn create_post(&self, post: &NewPost) -> Result<CreatePostOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.posts.iter().any(|p| p.url == post.url) {
            return Ok(CreatePostOutcome::UniqueConflict);
        }
        if state
            .fail_posts_after
            .is_some_and(|n| state.posts.len() >= n)
        {
            return Err(RssAggError::Database("storage unavailable".to_string()));
        }
        state.posts.push(post.clone());
        Ok(CreatePostOutcome::Created(state.posts.len() as i64))
    }
}

/// `FeedSource` serving canned responses per URL, with an optional delay.
pub struct StaticSource {
    responses: HashMap<String, std::result::Result<Vec<u8>, FetchError>>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// Minimal RSS 2.0 document with one item per link.
pub fn rss_document(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| format!("<item><title>{link}</title><link>{link}</link></item>"))
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>{items}</channel></rss>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_mark_is_strictly_monotonic() {
        let store = MemoryStore::new();
        let id = store.add_feed("https://feeds.test/a.xml", None);
        let at = Utc::now();

        assert!(store.mark_feed_fetched(id, at).await.unwrap());
        assert!(!store.mark_feed_fetched(id, at).await.unwrap());
        assert!(!store
            .mark_feed_fetched(id, at - chrono::Duration::seconds(1))
            .await
            .unwrap());
        assert!(store
            .mark_feed_fetched(id, at + chrono::Duration::seconds(1))
            .await
            .unwrap());
        assert!(!store.mark_feed_fetched(99, at).await.unwrap());
    }
}
