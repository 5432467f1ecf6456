//! Database schema and migrations for rssagg.
//!
//! Migrations are applied in order; the `schema_version` table records which
//! ones have run. Timestamps are written by the application, so both backends
//! compare them consistently.

/// Database migrations.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: feeds and posts
    r#"
CREATE TABLE feeds (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    url             TEXT NOT NULL UNIQUE,
    user_id         INTEGER,                 -- owning user, NULL for shared feeds
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    last_fetched_at TEXT                     -- NULL until the first fetch attempt
);

CREATE INDEX idx_feeds_last_fetched ON feeds(last_fetched_at, id);

CREATE TABLE posts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL,
    description  TEXT,
    url          TEXT NOT NULL UNIQUE,       -- dedup key across all feeds
    published_at TEXT NOT NULL,
    feed_id      INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX idx_posts_feed_published ON posts(feed_id, published_at DESC);
"#,
];

/// Database migrations.
#[cfg(feature = "postgres")]
pub const MIGRATIONS: &[&str] = &[
    // v1: feeds and posts
    r#"
CREATE TABLE feeds (
    id              BIGSERIAL PRIMARY KEY,
    name            TEXT NOT NULL,
    url             TEXT NOT NULL UNIQUE,
    user_id         BIGINT,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    last_fetched_at TIMESTAMPTZ
);

CREATE INDEX idx_feeds_last_fetched ON feeds(last_fetched_at NULLS FIRST, id);

CREATE TABLE posts (
    id           BIGSERIAL PRIMARY KEY,
    title        TEXT NOT NULL,
    description  TEXT,
    url          TEXT NOT NULL UNIQUE,
    published_at TIMESTAMPTZ NOT NULL,
    feed_id      BIGINT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    created_at   TIMESTAMPTZ NOT NULL,
    updated_at   TIMESTAMPTZ NOT NULL
);

CREATE INDEX idx_posts_feed_published ON posts(feed_id, published_at DESC);
"#,
];
