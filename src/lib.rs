//! RSS/Atom feed ingestion.
//!
//! Given an arbitrary URL, find the feed it points at, fetch and classify it,
//! and return a normalized [`feed::Source`] plus its [`feed::Post`]s. Many
//! feeds can be loaded at once under a wall-clock budget with
//! [`feed::Parser::load_multiple`].

pub mod config;
pub mod feed;
pub mod util;
