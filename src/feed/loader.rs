use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::document::Document;
use super::fetcher::{DocumentFetcher, FetchError};
use super::finder::FeedFinder;
use super::format::{parse_document, ParsedFeed};
use super::models::{Post, Source};
use crate::config::Config;
use crate::util::{validate_url, UrlPolicy};

/// Loads feeds end to end: validate, fetch, classify, parse.
///
/// No error crosses this boundary. Callers read the outcome from the
/// signals the methods leave behind:
///
/// - [`Parser::is_valid`] returns `false`
/// - after [`Parser::load`], [`Parser::source`] is `None` and [`Parser::posts`] is empty
/// - [`Parser::load_multiple`] returns whatever posts it could collect
///
/// # Example
///
/// ```no_run
/// use rss_feed::config::Config;
/// use rss_feed::feed::Parser;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut parser = Parser::new(Config::default())?;
/// parser.load("https://example.com/feed.xml").await;
/// if let Some(source) = parser.source() {
///     println!("{:?}: {} posts", source.title, parser.posts().len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Parser {
    fetcher: DocumentFetcher,
    finder: FeedFinder,
    config: Arc<Config>,
    source: Option<Source>,
    posts: Vec<Post>,
}

impl Parser {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let fetcher = DocumentFetcher::new(&config)?;
        Ok(Self::with_fetcher(fetcher, Arc::new(config)))
    }

    /// Builds a parser around an existing fetcher (sharing its connection pool).
    pub fn with_fetcher(fetcher: DocumentFetcher, config: Arc<Config>) -> Self {
        let finder = FeedFinder::new(fetcher.clone(), &config);
        Self {
            fetcher,
            finder,
            config,
            source: None,
            posts: Vec::new(),
        }
    }

    /// A fresh parser sharing this one's fetcher and configuration.
    fn sibling(&self) -> Self {
        Self::with_fetcher(self.fetcher.clone(), Arc::clone(&self.config))
    }

    fn url_policy(&self) -> UrlPolicy {
        UrlPolicy {
            allow_private_hosts: self.config.allow_private_hosts,
        }
    }

    /// Source produced by the last successful [`load`](Self::load) or [`parse`](Self::parse).
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Posts of the last load, in document order.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn take_posts(&mut self) -> Vec<Post> {
        std::mem::take(&mut self.posts)
    }

    /// Checks that `source.url` leads to a feed.
    ///
    /// On success `source.url` is rewritten to the canonical feed URL
    /// (after redirects and auto-discovery); callers must re-read it.
    /// On failure the source is left untouched.
    pub async fn is_valid(&self, source: &mut Source) -> bool {
        match self.finder.find(&source.url).await {
            Ok(url) => {
                if url.as_str() != source.url {
                    tracing::debug!(from = %source.url, to = %url, "Resolved canonical feed URL");
                }
                source.url = url.into();
                true
            }
            Err(e) => {
                tracing::debug!(url = %source.url, error = %e, "Source did not resolve to a feed");
                false
            }
        }
    }

    /// Fetches, classifies and parses a single feed.
    ///
    /// An empty `url` is a no-op. Any failure leaves [`source`](Self::source)
    /// as `None` and [`posts`](Self::posts) empty.
    pub async fn load(&mut self, url: &str) {
        if url.trim().is_empty() {
            return;
        }

        self.source = None;
        self.posts.clear();

        let target = match validate_url(url, self.url_policy()) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Rejected feed URL");
                return;
            }
        };

        match self.fetcher.fetch(target.as_str()).await {
            Ok(document) => self.parse(&document),
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Failed to fetch feed");
            }
        }
    }

    /// Classifies and parses an already fetched document.
    pub fn parse(&mut self, document: &Document) {
        self.source = None;
        self.posts.clear();

        match parse_document(document) {
            Some(ParsedFeed { source, posts }) => {
                tracing::debug!(url = %source.url, posts = posts.len(), "Parsed feed");
                self.source = Some(source);
                self.posts = posts;
            }
            None => {
                tracing::warn!(
                    url = %document.url,
                    content_type = document.content_type.as_deref().unwrap_or("unknown"),
                    "Document is not an RSS or Atom feed"
                );
            }
        }
    }

    /// Loads every visible source concurrently and merges their posts.
    ///
    /// # Behavior
    ///
    /// - Invisible sources, and sources without a URL, are skipped without being fetched
    /// - Sources are split into slices of `batch_width`; each slice is one
    ///   concurrent unit that loads its sources in order with its own parser
    /// - A failing source is logged and skipped; its siblings carry on
    /// - The whole call is bounded by `batch_deadline`. When it expires the
    ///   outstanding units are cancelled and the posts collected so far are
    ///   returned
    ///
    /// Each source's posts keep their document order. No order is defined
    /// across sources.
    pub async fn load_multiple(&self, sources: &[Source]) -> Vec<Post> {
        let visible: Vec<&Source> = sources
            .iter()
            .filter(|s| s.visible && s.is_valid())
            .collect();
        let skipped = sources.len() - visible.len();
        if skipped > 0 {
            tracing::debug!(skipped, "Skipping invisible or URL-less sources");
        }
        if visible.is_empty() {
            return Vec::new();
        }

        let deadline = Instant::now() + self.config.batch_deadline();
        let width = self.config.batch_width.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Post>>();
        let mut units = JoinSet::new();

        for slice in visible.chunks(width) {
            let urls: Vec<String> = slice.iter().map(|s| s.url.clone()).collect();
            let mut parser = self.sibling();
            let tx = tx.clone();

            units.spawn(async move {
                for url in urls {
                    if Instant::now() >= deadline {
                        break;
                    }
                    parser.load(&url).await;
                    if parser.source().is_none() {
                        tracing::debug!(url = %url, "Source contributed no posts");
                        continue;
                    }
                    // Receiver gone means the collector stopped waiting
                    if tx.send(parser.take_posts()).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let units_total = units.len();
        let mut posts = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(batch)) => posts.extend(batch),
                // Every unit has finished and dropped its sender
                Ok(None) => break,
                Err(_) => {
                    while let Ok(batch) = rx.try_recv() {
                        posts.extend(batch);
                    }
                    tracing::info!(
                        sources = visible.len(),
                        collected = posts.len(),
                        "Batch deadline reached, returning partial results"
                    );
                    units.abort_all();
                    return posts;
                }
            }
        }

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "Feed loading unit panicked");
                }
            }
        }

        tracing::debug!(
            sources = visible.len(),
            units = units_total,
            posts = posts.len(),
            "Loaded sources"
        );
        posts
    }
}
