//! Test helpers for ingestion integration tests.
//!
//! Provides an in-memory database, a wiremock-backed feed server and small
//! document builders.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rssagg::rss::{
    CycleSettings, FeedPipeline, FeedRepository, FetcherSettings, HttpFeedSource, IngestStats,
    NewFeed, PostRepository,
};
use rssagg::{Database, Feed};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a migrated in-memory database.
pub async fn setup_test_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().await.unwrap())
}

/// Create a feed and return it.
pub async fn create_feed(db: &Database, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url))
        .await
        .unwrap()
}

/// Reload a feed by ID.
pub async fn reload_feed(db: &Database, id: i64) -> Feed {
    FeedRepository::new(db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap()
}

/// Set a feed's freshness marker directly.
pub async fn mark_feed(db: &Database, id: i64, at: DateTime<Utc>) {
    assert!(FeedRepository::new(db.pool())
        .mark_fetched(id, at)
        .await
        .unwrap());
}

pub async fn post_count(db: &Database) -> i64 {
    PostRepository::new(db.pool()).count().await.unwrap()
}

pub async fn post_count_by_feed(db: &Database, feed_id: i64) -> i64 {
    PostRepository::new(db.pool())
        .count_by_feed(feed_id)
        .await
        .unwrap()
}

/// HTTP source allowed to reach the local mock server.
pub fn local_source() -> HttpFeedSource {
    HttpFeedSource::new(FetcherSettings {
        allow_private_hosts: true,
        total_timeout: Duration::from_secs(2),
        ..FetcherSettings::default()
    })
    .unwrap()
}

/// Build a pipeline over the database and the local HTTP source.
pub fn pipeline(db: &Arc<Database>) -> (Arc<FeedPipeline>, Arc<IngestStats>) {
    let stats = Arc::new(IngestStats::new());
    let pipeline = Arc::new(FeedPipeline::new(
        Arc::new(local_source()),
        db.clone(),
        CycleSettings::default(),
        stats.clone(),
    ));
    (pipeline, stats)
}

/// RSS 2.0 document with one item per link.
pub fn rss_document(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| {
            format!(
                "<item><title>Post {link}</title><link>{link}</link>\
                 <description>&lt;p&gt;About {link}&lt;/p&gt;</description>\
                 <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test Feed</title><link>https://example.com</link>{items}</channel></rss>"#
    )
}

/// Serve `body` as an RSS document at `route`.
pub async fn serve_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

/// Answer `route` with the given status and no body.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
