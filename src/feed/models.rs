use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::trim;

/// Maximum length of a source title once trimmed for storage.
pub const SOURCE_TITLE_MAX_LENGTH: usize = 60;

fn default_visible() -> bool {
    true
}

/// Feed-level metadata.
///
/// A format parser builds a fresh `Source` on every fetch. The `id` and the
/// user overrides (`title`, `visible`) belong to the caller, which carries
/// them across re-parses with [`Source::apply_overrides`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Identifier assigned by the store on first persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Canonical feed URL (after redirects and auto-discovery).
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// The website the feed belongs to.
    #[serde(default)]
    pub site_url: Option<String>,
    /// Whether posts from this feed appear in aggregated views.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            title: None,
            image: None,
            description: None,
            site_url: None,
            visible: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.url.is_empty()
    }

    /// Carries caller-owned state onto a freshly parsed source.
    ///
    /// The previous `id` is kept, a non-empty user title replaces the parsed
    /// one, and `visible` is taken from the caller.
    pub fn apply_overrides(&mut self, previous: Option<&Source>, user_title: &str, visible: bool) {
        if let Some(previous) = previous {
            self.id = previous.id;
        }
        let user_title = user_title.trim();
        if !user_title.is_empty() {
            self.title = Some(user_title.to_owned());
        }
        self.visible = visible;
    }

    /// Truncates the title to [`SOURCE_TITLE_MAX_LENGTH`] characters.
    pub fn trim(&mut self) {
        self.title = self
            .title
            .as_deref()
            .map(|title| trim(title, SOURCE_TITLE_MAX_LENGTH).into_owned());
    }
}

/// A single feed entry.
///
/// Posts reference their source by URL only; they are returned next to the
/// `Source`, never stored inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// Absolute URL of the entry.
    pub link: String,
    /// Short summary (`description` in RSS, `summary` in Atom).
    pub description: Option<String>,
    /// Full content (`content:encoded` in RSS, `content` in Atom).
    pub content: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    /// `None` when the feed gave no date or one in an unknown layout.
    pub published_at: Option<DateTime<Utc>>,
    /// URL of the owning [`Source`].
    pub feed_url: String,
}
