use url::Url;

use super::document::{Document, Element};
use super::models::{Post, Source};
use super::{atom, rss};
use crate::util::extract_attribute;

const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
/// Pre-1.0 Atom drafts (0.3) used this namespace family.
const ATOM_LEGACY_NAMESPACE_PREFIX: &str = "http://purl.org/atom";

/// Result of inspecting a document's root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
    Unknown,
}

impl FeedFormat {
    pub fn is_feed(self) -> bool {
        !matches!(self, FeedFormat::Unknown)
    }
}

/// Namespace bound to the element's prefix (or the default namespace).
fn namespace_of(element: &Element) -> Option<&str> {
    let attr = match element.name.split_once(':') {
        Some((prefix, _)) => format!("xmlns:{prefix}"),
        None => "xmlns".to_owned(),
    };
    element.attr(&attr)
}

/// Determines whether a document is RSS, Atom, or neither.
///
/// Only the root element and its namespace are considered, never the URL or
/// the content type. A missing namespace declaration is tolerated; a
/// declared non-Atom namespace on a `<feed>` root is not.
pub fn classify(document: &Document) -> FeedFormat {
    let Some(root) = document.root.as_ref() else {
        return FeedFormat::Unknown;
    };

    match root.local_name().to_ascii_lowercase().as_str() {
        "rss" => FeedFormat::Rss,
        // RSS 1.0
        "rdf" if root.child_local("channel").is_some() => FeedFormat::Rss,
        "feed" => match namespace_of(root) {
            Some(ns) if ns != ATOM_NAMESPACE && !ns.starts_with(ATOM_LEGACY_NAMESPACE_PREFIX) => {
                FeedFormat::Unknown
            }
            _ => FeedFormat::Atom,
        },
        _ => FeedFormat::Unknown,
    }
}

/// A feed as extracted by a format parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub source: Source,
    /// Entries in document order.
    pub posts: Vec<Post>,
}

/// The format-specific parsers. Selected once from the classifier's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatParser {
    Rss,
    Atom,
}

impl FormatParser {
    pub fn for_format(format: FeedFormat) -> Option<Self> {
        match format {
            FeedFormat::Rss => Some(FormatParser::Rss),
            FeedFormat::Atom => Some(FormatParser::Atom),
            FeedFormat::Unknown => None,
        }
    }

    /// Extracts the source and its posts.
    ///
    /// Returns `None` when no minimally valid source can be built; the whole
    /// load is then treated as failed.
    pub fn parse(self, document: &Document) -> Option<ParsedFeed> {
        let parsed = match self {
            FormatParser::Rss => rss::parse(document),
            FormatParser::Atom => atom::parse(document),
        }?;

        if parsed.source.title.is_none() && !parsed.source.is_valid() {
            return None;
        }
        Some(parsed)
    }
}

/// Classifies and parses a document in one step.
pub fn parse_document(document: &Document) -> Option<ParsedFeed> {
    FormatParser::for_format(classify(document))?.parse(document)
}

/// Resolves a link found in a feed to an absolute http(s) URL.
pub(super) fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href).ok()?,
        Err(_) => return None,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Base for relative entry links: the feed's website if it is absolute,
/// otherwise the document URL.
pub(super) fn link_base(site_url: Option<&str>, document_url: &Url) -> Url {
    site_url
        .and_then(|site| Url::parse(site).ok())
        .unwrap_or_else(|| document_url.clone())
}

/// First `<img src="...">` in an HTML fragment.
///
/// Pattern fallback for entries whose markup carries no structured image.
pub(super) fn embedded_image(html: &str, base: &Url) -> Option<String> {
    let start = html.find("<img")?;
    let src = extract_attribute(&html[start..], "src");
    resolve_link(&src, base)
}

/// Whether a MIME type names an image.
pub(super) fn is_image_type(mime: Option<&str>) -> bool {
    mime.is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
}

/// Whether a URL path ends in a common image file extension.
pub(super) fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".avif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}
