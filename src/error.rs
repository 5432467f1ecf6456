//! Error types for rssagg.

use thiserror::Error;

/// Common error type for rssagg.
#[derive(Error, Debug)]
pub enum RssAggError {
    /// Database error.
    ///
    /// Wraps errors from any database backend. Errors from sqlx are converted
    /// automatically.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for RssAggError {
    fn from(e: sqlx::Error) -> Self {
        RssAggError::Database(e.to_string())
    }
}

/// Result type alias for rssagg operations.
pub type Result<T> = std::result::Result<T, RssAggError>;

/// Failure to retrieve a feed document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL points at a host that must not be contacted.
    #[error("forbidden host: {0}")]
    Forbidden(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection, TLS or body transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The server answered with an empty body.
    #[error("empty response body")]
    EmptyBody,

    /// The body exceeds the configured size limit.
    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Document-level syndication parse failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed feed document: {0}")]
pub struct ParseError(pub String);

/// Reason a single feed-cycle ended in `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Storage rejected an insert for a reason other than a duplicate URL.
    /// Candidates after the failing one were not attempted; `created` and
    /// `duplicates` count the ones before it.
    #[error("persist error after {created} new post(s): {reason}")]
    Persist {
        created: usize,
        duplicates: usize,
        reason: String,
    },
}
