//! Feed ingestion: from an arbitrary URL to a normalized feed and its posts.
//!
//! # Architecture
//!
//! - [`fetcher`](DocumentFetcher) - HTTP retrieval with timeouts, retries and size limits
//! - [`document`] - Tolerant markup tree built from the fetched body
//! - [`finder`](FeedFinder) - Resolves a URL to its feed, following auto-discovery links
//! - [`format`](classify) - Root-element classification and the RSS/Atom dispatch
//! - `rss`, `atom` - Per-format field mapping into [`Source`] and [`Post`]
//! - [`loader`](Parser) - The orchestrator: single loads and concurrent batch loads
//!
//! # Example
//!
//! ```no_run
//! use rss_feed::config::Config;
//! use rss_feed::feed::{Parser, Source};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = Parser::new(Config::default())?;
//!
//! let mut source = Source::new("example.com");
//! if parser.is_valid(&mut source).await {
//!     // source.url now holds the discovered feed URL
//!     let posts = parser.load_multiple(&[source]).await;
//!     println!("{} posts", posts.len());
//! }
//! # Ok(())
//! # }
//! ```

mod atom;
pub mod document;
mod fetcher;
mod finder;
mod format;
mod loader;
mod models;
mod rss;

pub use document::Document;
pub use fetcher::{DocumentFetcher, FetchError};
pub use finder::{FeedFinder, FinderError};
pub use format::{classify, parse_document, FeedFormat, FormatParser, ParsedFeed};
pub use loader::Parser;
pub use models::{Post, Source, SOURCE_TITLE_MAX_LENGTH};
