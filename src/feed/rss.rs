//! RSS 0.9x / 1.0 / 2.0 field mapping.

use url::Url;

use super::document::{Document, Element};
use super::format::{
    embedded_image, has_image_extension, is_image_type, link_base, resolve_link, ParsedFeed,
};
use super::models::{Post, Source};
use crate::util::{clean_text, extract_attribute, parse_date};

fn child_text(element: &Element, name: &str) -> Option<String> {
    element.child(name).and_then(|el| clean_text(&el.text()))
}

pub(super) fn parse(document: &Document) -> Option<ParsedFeed> {
    let root = document.root.as_ref()?;
    let channel = root.child_local("channel")?;

    let site_url = child_text(channel, "link").and_then(|href| resolve_link(&href, &document.url));

    let image = channel
        .child("image")
        .and_then(|img| child_text(img, "url"))
        .or_else(|| {
            channel
                .child("itunes:image")
                .and_then(|img| img.attr("href"))
                .map(str::to_owned)
        })
        .and_then(|href| resolve_link(&href, &document.url));

    let source = Source {
        title: child_text(channel, "title"),
        description: child_text(channel, "description"),
        image,
        site_url,
        ..Source::new(document.url.as_str())
    };

    let base = link_base(source.site_url.as_deref(), &document.url);

    // RSS 2.0 nests items in the channel, RSS 1.0 places them next to it
    let posts: Vec<Post> = channel
        .children_local("item")
        .chain(root.children_local("item"))
        .filter_map(|item| parse_item(item, &base, &source.url))
        .collect();

    Some(ParsedFeed { source, posts })
}

fn item_link(item: &Element, base: &Url) -> Option<String> {
    if let Some(link) = child_text(item, "link").and_then(|href| resolve_link(&href, base)) {
        return Some(link);
    }

    // A permalink guid doubles as the link
    let permalink = item
        .child("guid")
        .filter(|guid| guid.attr("isPermaLink") != Some("false"))
        .and_then(|guid| clean_text(&guid.text()))
        .filter(|guid| guid.starts_with("http://") || guid.starts_with("https://"));
    if let Some(link) = permalink {
        return Some(link);
    }

    item.children_named("atom:link")
        .find_map(|link| link.attr("href"))
        .and_then(|href| resolve_link(href, base))
}

/// Structured image sources, then the pattern fallback over embedded HTML.
fn item_image(item: &Element, html: &[Option<&str>], base: &Url) -> Option<String> {
    let enclosure = item.children_named("enclosure").find_map(|enc| {
        // Attributes the parser rejected are recovered from the raw tag text
        let url = match enc.attr("url") {
            Some(url) => url.to_owned(),
            None => extract_attribute(&enc.raw_tag, "url"),
        };
        let mime = match enc.attr("type") {
            Some(mime) => mime.to_owned(),
            None => extract_attribute(&enc.raw_tag, "type"),
        };
        let is_image = if mime.is_empty() {
            has_image_extension(&url)
        } else {
            is_image_type(Some(&mime))
        };
        if !is_image {
            return None;
        }
        resolve_link(&url, base)
    });
    if enclosure.is_some() {
        return enclosure;
    }

    let media_content = item
        .child("media:group")
        .into_iter()
        .flat_map(|group| group.children_named("media:content"))
        .chain(item.children_named("media:content"))
        .filter(|media| {
            media.attr("medium") == Some("image")
                || is_image_type(media.attr("type"))
                || (media.attr("medium").is_none() && media.attr("type").is_none())
        })
        .find_map(|media| media.attr("url"))
        .and_then(|url| resolve_link(url, base));
    if media_content.is_some() {
        return media_content;
    }

    let thumbnail = item
        .child("media:thumbnail")
        .and_then(|thumb| thumb.attr("url"))
        .and_then(|url| resolve_link(url, base));
    if thumbnail.is_some() {
        return thumbnail;
    }

    html.iter()
        .flatten()
        .find_map(|fragment| embedded_image(fragment, base))
}

fn parse_item(item: &Element, base: &Url, feed_url: &str) -> Option<Post> {
    let Some(link) = item_link(item, base) else {
        tracing::debug!(feed = %feed_url, "Dropping RSS item without a resolvable link");
        return None;
    };

    let description = child_text(item, "description");
    let content = child_text(item, "content:encoded");
    let image = item_image(item, &[description.as_deref(), content.as_deref()], base);

    let published_at = child_text(item, "pubDate")
        .or_else(|| child_text(item, "dc:date"))
        .and_then(|date| parse_date(&date));

    Some(Post {
        title: child_text(item, "title").unwrap_or_default(),
        link,
        description,
        content,
        author: child_text(item, "author").or_else(|| child_text(item, "dc:creator")),
        image,
        published_at,
        feed_url: feed_url.to_owned(),
    })
}
