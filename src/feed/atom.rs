//! Atom 1.0 (and tolerated 0.3) field mapping.

use url::Url;

use super::document::{Document, Element};
use super::format::{embedded_image, is_image_type, link_base, resolve_link, ParsedFeed};
use super::models::{Post, Source};
use crate::util::{clean_text, parse_date};

/// Names in the feed's own vocabulary.
///
/// Atom elements are unprefixed, or carry the prefix the root element uses
/// (`atom:feed`, `atom:entry`). Extension elements such as `media:title`
/// share local names with Atom ones and must not stand in for them.
#[derive(Debug, Clone, Copy)]
struct Atom<'a> {
    prefix: Option<&'a str>,
}

impl<'a> Atom<'a> {
    fn of(root: &'a Element) -> Self {
        Self {
            prefix: root.name.split_once(':').map(|(prefix, _)| prefix),
        }
    }

    fn is(self, element: &Element, local: &str) -> bool {
        match element.name.split_once(':') {
            None => element.name == local,
            Some((prefix, name)) => {
                name == local && (Some(prefix) == self.prefix || prefix == "atom")
            }
        }
    }

    fn children<'e>(
        self,
        parent: &'e Element,
        local: &'e str,
    ) -> impl Iterator<Item = &'e Element> + 'e
    where
        'a: 'e,
    {
        parent.elements().filter(move |el| self.is(el, local))
    }

    fn child<'e>(self, parent: &'e Element, local: &str) -> Option<&'e Element> {
        parent.elements().find(|el| self.is(el, local))
    }

    fn child_text(self, parent: &Element, local: &str) -> Option<String> {
        self.child(parent, local).and_then(text_construct)
    }

    fn alternate_href(self, element: &'a Element) -> Option<&'a str> {
        self.children(element, "link")
            .filter(|link| is_alternate(link))
            .find_map(|link| link.attr("href"))
    }
}

/// Text of an Atom text construct.
///
/// `type="xhtml"` content is wrapped in child elements, so fall back to the
/// nested text when there is no direct text.
fn text_construct(element: &Element) -> Option<String> {
    clean_text(&element.text()).or_else(|| clean_text(&element.inner_text()))
}

fn is_alternate(link: &Element) -> bool {
    matches!(link.attr("rel"), None | Some("alternate"))
}

pub(super) fn parse(document: &Document) -> Option<ParsedFeed> {
    let root = document.root.as_ref()?;
    let atom = Atom::of(root);

    let site_url = atom
        .alternate_href(root)
        .and_then(|href| resolve_link(href, &document.url));

    let image = atom
        .child_text(root, "logo")
        .or_else(|| atom.child_text(root, "icon"))
        .and_then(|href| resolve_link(&href, &document.url));

    let source = Source {
        title: atom.child_text(root, "title"),
        description: atom
            .child_text(root, "subtitle")
            .or_else(|| atom.child_text(root, "tagline")),
        image,
        site_url,
        ..Source::new(document.url.as_str())
    };

    let base = link_base(source.site_url.as_deref(), &document.url);

    let posts: Vec<Post> = atom
        .children(root, "entry")
        .filter_map(|entry| parse_entry(atom, entry, &base, &source.url))
        .collect();

    Some(ParsedFeed { source, posts })
}

fn entry_link(atom: Atom<'_>, entry: &Element, base: &Url) -> Option<String> {
    entry
        .elements()
        .filter(|el| atom.is(el, "link") && is_alternate(el))
        .find_map(|link| link.attr("href"))
        .or_else(|| {
            // No alternate link: take any link that is not an enclosure
            entry
                .elements()
                .filter(|el| atom.is(el, "link") && el.attr("rel") != Some("enclosure"))
                .find_map(|link| link.attr("href"))
        })
        .and_then(|href| resolve_link(href, base))
}

fn entry_image(
    atom: Atom<'_>,
    entry: &Element,
    html: &[Option<&str>],
    base: &Url,
) -> Option<String> {
    let structured = entry
        .elements()
        .filter(|el| {
            atom.is(el, "link")
                && el.attr("rel") == Some("enclosure")
                && is_image_type(el.attr("type"))
        })
        .find_map(|link| link.attr("href"))
        .or_else(|| {
            entry
                .children_named("media:thumbnail")
                .chain(entry.children_named("media:content"))
                .find_map(|media| media.attr("url"))
        })
        .and_then(|href| resolve_link(href, base));

    structured.or_else(|| {
        html.iter()
            .flatten()
            .find_map(|fragment| embedded_image(fragment, base))
    })
}

fn parse_entry(atom: Atom<'_>, entry: &Element, base: &Url, feed_url: &str) -> Option<Post> {
    let Some(link) = entry_link(atom, entry, base) else {
        tracing::debug!(feed = %feed_url, "Dropping Atom entry without a resolvable link");
        return None;
    };

    let description = atom.child_text(entry, "summary");
    let content = atom.child_text(entry, "content");
    let image = entry_image(atom, entry, &[description.as_deref(), content.as_deref()], base);

    // Atom 0.3 used `issued` and `modified`
    let published_at = ["published", "issued", "updated", "modified"]
        .iter()
        .filter_map(|name| atom.child_text(entry, name))
        .find_map(|date| parse_date(&date));

    let author = atom
        .child(entry, "author")
        .and_then(|author| atom.child_text(author, "name"));

    Some(Post {
        title: atom.child_text(entry, "title").unwrap_or_default(),
        link,
        description,
        content,
        author,
        image,
        published_at,
        feed_url: feed_url.to_owned(),
    })
}
