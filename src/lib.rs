//! rssagg - RSS/Atom feed aggregator
//!
//! Background ingestion of subscribed feeds into a relational store.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod rss;

pub use config::Config;
pub use db::Database;
pub use error::{CycleError, FetchError, ParseError, Result, RssAggError};
pub use rss::{
    start_ingestor, Feed, FeedSource, FeedStore, HttpFeedSource, IngestSettings, IngestorHandle,
    NewFeed, Post,
};
