use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use super::fetcher::{DocumentFetcher, FetchError};
use super::format::classify;
use crate::config::Config;
use crate::util::{validate_url, UrlPolicy, UrlValidationError};

static RE_LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").unwrap());
static RE_TAG_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\b([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Errors that can occur while locating a feed.
#[derive(Debug, Error)]
pub enum FinderError {
    /// The provided URL failed validation (empty, bad scheme, private host, etc.)
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// The URL does not point to an RSS/Atom feed and no feed link was found in HTML
    #[error("not a feed: no RSS/Atom content found")]
    NotAFeed,
    /// Auto-discovery led back to a page already visited
    #[error("discovery loop at {0}")]
    DiscoveryLoop(String),
    /// More auto-discovery hops than allowed
    #[error("gave up after {0} discovery hops")]
    TooManyHops(usize),
    /// Fetching one of the candidates failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Resolves an arbitrary URL to the URL of the feed it points at.
#[derive(Debug, Clone)]
pub struct FeedFinder {
    fetcher: DocumentFetcher,
    policy: UrlPolicy,
    max_hops: usize,
}

impl FeedFinder {
    pub fn new(fetcher: DocumentFetcher, config: &Config) -> Self {
        Self {
            fetcher,
            policy: UrlPolicy {
                allow_private_hosts: config.allow_private_hosts,
            },
            max_hops: config.max_discovery_hops,
        }
    }

    /// Finds the canonical feed URL for `url`.
    ///
    /// If the fetched document is RSS or Atom, its final URL (after
    /// redirects) is returned. Otherwise the page is scanned for an
    /// auto-discovery `<link rel="alternate">` and the target is checked the
    /// same way.
    ///
    /// # Errors
    ///
    /// - [`FinderError::InvalidUrl`] - Empty, malformed or disallowed URL (no I/O performed)
    /// - [`FinderError::Fetch`] - A candidate could not be fetched
    /// - [`FinderError::NotAFeed`] - Neither a feed nor a page advertising one
    /// - [`FinderError::DiscoveryLoop`] - Discovery returned to a visited URL
    /// - [`FinderError::TooManyHops`] - Discovery chain exceeded the hop limit
    pub async fn find(&self, url: &str) -> Result<Url, FinderError> {
        let mut current = validate_url(url, self.policy)?;
        let mut visited = HashSet::new();
        let mut hops = 0;

        loop {
            if !visited.insert(current.to_string()) {
                return Err(FinderError::DiscoveryLoop(current.to_string()));
            }

            let document = self.fetcher.fetch(current.as_str()).await?;
            visited.insert(document.url.to_string());

            if classify(&document).is_feed() {
                tracing::debug!(url = %url, feed = %document.url, hops, "Resolved feed URL");
                return Ok(document.url);
            }

            let next = find_feed_link_in_html(&document.text, &document.url)
                .ok_or(FinderError::NotAFeed)?;

            if hops >= self.max_hops {
                return Err(FinderError::TooManyHops(self.max_hops));
            }
            hops += 1;

            tracing::debug!(page = %document.url, candidate = %next, "Following feed auto-discovery link");
            // SEC: discovered links are validated like user input before fetching
            current = validate_url(next.as_str(), self.policy)?;
        }
    }
}

fn tag_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    RE_TAG_ATTR.captures_iter(tag).find_map(|caps| {
        let key = caps.get(1)?;
        if !key.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
    })
}

fn is_feed_type(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    mime.starts_with("application/rss+xml") || mime.starts_with("application/atom+xml")
}

/// Scans HTML for `<link>` tags with `rel="alternate"` and an RSS/Atom type.
///
/// Attribute order and quote style do not matter. The `href` is resolved
/// against the page URL (relative and protocol-relative forms included).
/// The first matching link wins.
pub(crate) fn find_feed_link_in_html(html: &str, base: &Url) -> Option<Url> {
    RE_LINK_TAG.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let is_alternate = tag_attr(tag, "rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("alternate"))
        });
        if !is_alternate || !tag_attr(tag, "type").is_some_and(is_feed_type) {
            return None;
        }
        let href = tag_attr(tag, "href")?.trim();
        if href.is_empty() {
            return None;
        }
        base.join(href).ok()
    })
}
