//! Feed source client.
//!
//! Retrieves raw feed documents over HTTP with a bounded timeout, SSRF
//! protection and a response-size limit. Parsing lives in [`super::parser`].

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::IngestConfig;
use crate::error::FetchError;
use crate::rss::types::MAX_FEED_SIZE;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent string for feed fetching.
const USER_AGENT: &str = concat!("rssagg/", env!("CARGO_PKG_VERSION"));

/// Source of raw feed documents.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieve the document at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Settings for [`HttpFeedSource`].
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Total request timeout, including the body transfer.
    pub total_timeout: Duration,
    /// Maximum number of redirects.
    pub max_redirects: usize,
    /// Maximum body size in bytes.
    pub max_feed_size: u64,
    /// User agent.
    pub user_agent: String,
    /// Allow loopback and private-network hosts.
    pub allow_private_hosts: bool,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            total_timeout: Duration::from_secs(TOTAL_TIMEOUT_SECS),
            max_redirects: MAX_REDIRECTS,
            max_feed_size: MAX_FEED_SIZE,
            user_agent: USER_AGENT.to_string(),
            allow_private_hosts: false,
        }
    }
}

impl From<&IngestConfig> for FetcherSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            total_timeout: Duration::from_secs(config.total_timeout_secs),
            max_redirects: config.max_redirects,
            max_feed_size: config.max_feed_size_bytes,
            user_agent: config.user_agent.clone(),
            allow_private_hosts: config.allow_private_hosts,
        }
    }
}

/// HTTP feed source built on a shared `reqwest` client.
pub struct HttpFeedSource {
    client: Client,
    settings: FetcherSettings,
}

impl HttpFeedSource {
    /// Create a new source with the given settings.
    pub fn new(settings: FetcherSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.total_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, settings })
    }

    /// Settings this source was built with.
    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.settings.allow_private_hosts {
            validate_scheme(url)?;
        } else {
            validate_url(url)?;
        }

        let mut response = self.client.get(url).send().await.map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let max = self.settings.max_feed_size;
        let content_length = response.content_length();
        if let Some(size) = content_length.filter(|&size| size > max) {
            return Err(FetchError::TooLarge { size, max });
        }

        // Content-Length may be absent or describe the compressed body, so the
        // limit is enforced again while streaming.
        let capacity = content_length.unwrap_or(0).min(max) as usize;
        let mut body = Vec::with_capacity(capacity);
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest)? {
            push_capped(&mut body, &chunk, max)?;
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::EmptyBody);
        }

        Ok(body)
    }
}

/// Append `chunk` to `body`, failing once the total would exceed `max` bytes.
fn push_capped(body: &mut Vec<u8>, chunk: &[u8], max: u64) -> Result<(), FetchError> {
    let size = (body.len() + chunk.len()) as u64;
    if size > max {
        return Err(FetchError::TooLarge { size, max });
    }
    body.extend_from_slice(chunk);
    Ok(())
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Parse a URL and check it uses http or https.
fn validate_scheme(url: &str) -> Result<url::Url, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetchError::InvalidUrl(format!(
            "unsupported URL scheme: {}",
            scheme
        ))),
    }
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<(), FetchError> {
    let parsed = validate_scheme(url)?;

    let host = parsed
        .host()
        .ok_or_else(|| FetchError::InvalidUrl("URL has no host".to_string()))?;

    match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(FetchError::Forbidden(domain.to_string()));
            }
        }
        url::Host::Ipv4(ipv4) => {
            let ip = IpAddr::V4(ipv4);
            if is_private_ip(&ip) {
                return Err(FetchError::Forbidden(format!("private IP address {}", ip)));
            }
        }
        url::Host::Ipv6(ipv6) => {
            let ip = IpAddr::V6(ipv6);
            if is_private_ip(&ip) {
                return Err(FetchError::Forbidden(format!("private IP address {}", ip)));
            }
        }
    }

    Ok(())
}

/// Check if a hostname is forbidden.
fn is_forbidden_hostname(host: &str) -> bool {
    let host_lower = host.to_lowercase();

    if host_lower == "localhost" {
        return true;
    }

    let forbidden_suffixes = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    forbidden_suffixes
        .iter()
        .any(|suffix| host_lower.ends_with(suffix))
}

/// Check if an IP address is private/reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
                // IPv4-mapped: check the embedded address
                || ipv6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
