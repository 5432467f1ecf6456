//! Syndication parser.
//!
//! Turns a raw RSS 2.0 or Atom document into candidate posts. Items without a
//! usable link are dropped; everything else about an item is optional.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use url::Url;

use crate::error::ParseError;
use crate::rss::types::{CandidatePost, ParsedFeed, MAX_DESCRIPTION_LENGTH};

/// Parse a feed document.
///
/// Relative item links are resolved against `feed_url`. Items without a
/// published or updated date are stamped with `fetched_at`.
pub fn parse_feed(
    bytes: &[u8],
    feed_url: &str,
    fetched_at: DateTime<Utc>,
) -> Result<ParsedFeed, ParseError> {
    parse_feed_with_limit(bytes, feed_url, fetched_at, MAX_DESCRIPTION_LENGTH)
}

/// Parse a feed document, truncating descriptions to `max_description_length`
/// characters.
pub fn parse_feed_with_limit(
    bytes: &[u8],
    feed_url: &str,
    fetched_at: DateTime<Utc>,
    max_description_length: usize,
) -> Result<ParsedFeed, ParseError> {
    let feed = parser::parse(bytes).map_err(|e| ParseError(e.to_string()))?;
    let base = Url::parse(feed_url).ok();

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let mut items = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;

    for entry in feed.entries {
        match candidate_from_entry(entry, base.as_ref(), fetched_at, max_description_length) {
            Some(candidate) => items.push(candidate),
            None => skipped += 1,
        }
    }

    Ok(ParsedFeed {
        title,
        items,
        skipped,
    })
}

fn candidate_from_entry(
    entry: Entry,
    base: Option<&Url>,
    fetched_at: DateTime<Utc>,
    max_description_length: usize,
) -> Option<CandidatePost> {
    let url = pick_link(&entry.links).and_then(|href| resolve_link(href, base))?;

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();

    let description = entry
        .summary
        .map(|t| t.content)
        .or(entry.content.and_then(|c| c.body))
        .map(|d| truncate_description(&strip_html(&d), max_description_length))
        .filter(|d| !d.is_empty());

    let published_at = entry.published.or(entry.updated).unwrap_or(fetched_at);

    Some(CandidatePost {
        title,
        url,
        description,
        published_at,
    })
}

/// Link relations that never point at the article itself.
const NON_ARTICLE_RELS: &[&str] = &["self", "enclosure", "edit", "edit-media", "replies"];

/// Relative references accepted in item links. Anything else that fails to
/// parse as an absolute URL is treated as text, not a path.
const RELATIVE_PREFIXES: &[&str] = &["/", "./", "../", "?"];

/// Pick the link that points at the article itself.
///
/// Atom entries may carry several links; the alternate one (explicit or
/// implied by a missing `rel`) wins, otherwise the first link whose relation
/// can still name the article. Entries with only feed, media or edit links
/// have no article link.
fn pick_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| {
            links.iter().find(|l| {
                l.rel
                    .as_deref()
                    .is_some_and(|rel| !NON_ARTICLE_RELS.contains(&rel))
            })
        })
        .map(|l| l.href.trim())
        .filter(|href| !href.is_empty())
}

/// Resolve a link to an absolute http(s) URL.
///
/// Relative links must be explicit references (`/path`, `./path`, `../path`
/// or `?query`); bare words and anything containing whitespace are rejected.
fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    if href.chars().any(char::is_whitespace) {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase)
            if RELATIVE_PREFIXES.iter().any(|p| href.starts_with(p)) =>
        {
            base?.join(href).ok()?
        }
        Err(_) => return None,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Strip HTML tags from text.
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '&' if !in_tag => {
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(c) = parse_numeric_entity(&entity).and_then(char::from_u32) {
                            result.push(c);
                        }
                    }
                    _ => {
                        // Unknown entity, keep as-is
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                // A bare '&' followed by whitespace is not an entity
                if ch.is_whitespace() {
                    in_entity = false;
                    result.push('&');
                    result.push_str(&entity);
                    result.push(ch);
                } else {
                    entity.push(ch);
                }
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    if in_entity {
        result.push('&');
        result.push_str(&entity);
    }

    result.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
    }
}

/// Truncate a description to at most `max` characters.
fn truncate_description(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
