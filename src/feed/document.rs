//! Tolerant markup tree for fetched documents.
//!
//! Feeds in the wild are frequently not well-formed: a byte-order mark in
//! front of the declaration, HTML entities XML does not define, end tags
//! that do not match. The tree builder keeps whatever structure it can
//! recover instead of rejecting the document; classification and parsing
//! then decide whether that structure is a feed.

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// SEC-003: Maximum element nesting kept in the tree.
/// Deeper content is dropped to bound memory and recursion on hostile input.
const MAX_DEPTH: usize = 256;

/// Only the head of the body is searched for an XML declaration.
const DECLARATION_SCAN_BYTES: usize = 1024;

static RE_XML_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<\?xml\s[^>]*?\bencoding\s*=\s*["']([a-z0-9._:-]+)["']"#).unwrap()
});

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its qualified name (`media:content`), attributes in
/// document order, and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// The start tag as written, without the angle brackets.
    /// Kept for pattern-based recovery of attributes the parser rejected.
    pub raw_tag: String,
}

impl Element {
    /// The name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Looks up an attribute by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given qualified name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.name == name)
    }

    /// First child element with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Child elements with the given local name, whatever their prefix.
    pub fn children_local<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.local_name() == local)
    }

    /// First child element with the given local name.
    pub fn child_local(&self, local: &str) -> Option<&Element> {
        self.elements().find(|el| el.local_name() == local)
    }

    /// Text directly inside this element (text and CDATA children).
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// All text inside this element, descending into child elements.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(el, out),
        }
    }
}

/// A fetched resource.
#[derive(Debug, Clone)]
pub struct Document {
    /// Final URL after redirects.
    pub url: Url,
    /// `Content-Type` header, lowercased, if the server sent one.
    pub content_type: Option<String>,
    /// Body decoded with its declared character encoding (invalid sequences replaced).
    pub text: String,
    /// Recovered element tree; `None` when no root element could be read.
    pub root: Option<Element>,
}

impl Document {
    /// Decodes a response body and builds its element tree.
    ///
    /// See [`detect_encoding`] for how the character encoding is chosen.
    pub fn parse(url: Url, content_type: Option<String>, body: &[u8]) -> Self {
        let encoding = detect_encoding(content_type.as_deref(), body);
        // decode() also honors and strips a byte-order mark
        let (text, used, had_errors) = encoding.decode(body);
        if had_errors {
            tracing::debug!(url = %url, encoding = used.name(), "Replaced malformed byte sequences");
        }
        let text = text.into_owned();
        Self::from_text(url, content_type, text)
    }

    pub fn from_text(url: Url, content_type: Option<String>, text: String) -> Self {
        let root = parse_tree(&text);
        Self {
            url,
            content_type,
            text,
            root,
        }
    }
}

/// Charset parameter of a `Content-Type` value (`text/xml; charset=iso-8859-1`).
fn header_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

/// Encoding named in the body's `<?xml ... encoding="..."?>` declaration.
fn declared_encoding(body: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&body[..body.len().min(DECLARATION_SCAN_BYTES)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    let caps = RE_XML_ENCODING.captures(head)?;
    // A declaration readable as ASCII rules out UTF-16, whatever it claims
    Encoding::for_label(caps.get(1)?.as_str().as_bytes()).map(Encoding::output_encoding)
}

/// Chooses the character encoding for a response body.
///
/// The `Content-Type` charset wins, then the XML declaration, then UTF-8.
/// Unknown labels are skipped. A byte-order mark in the body overrides all
/// of these when decoding.
pub fn detect_encoding(content_type: Option<&str>, body: &[u8]) -> &'static Encoding {
    content_type
        .and_then(header_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| declared_encoding(body))
        .unwrap_or(UTF_8)
}

fn start_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attrs = start.attributes();
    attrs.with_checks(false);

    let mut attributes = Vec::new();
    for attr_result in attrs {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }

    Element {
        name,
        attributes,
        children: Vec::new(),
        raw_tag: String::from_utf8_lossy(start).into_owned(),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_text(stack: &mut [Element], text: String) {
    if text.is_empty() {
        return;
    }
    // Text outside the root element is ignored
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(text));
    }
}

/// Builds an element tree, recovering from malformed input.
///
/// - Leading BOM and whitespace are skipped.
/// - An end tag closes the nearest open element with that name (and any
///   elements still open inside it); unmatched end tags are ignored.
/// - Parsing stops at the first syntax error; elements still open are
///   closed so the structure read so far is kept.
fn parse_tree(text: &str) -> Option<Element> {
    let body = text.trim_start_matches('\u{feff}').trim_start();

    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; unknown
    // entities surface as unescape errors and fall back to the raw text below.
    // Text nodes stay untrimmed: whitespace between inline elements is part
    // of mixed content. Callers trim the fields they extract.
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    position = reader.buffer_position(),
                    "Stopping at malformed markup"
                );
                break;
            }
        };

        match event {
            Event::Start(e) => {
                if stack.len() >= MAX_DEPTH {
                    tracing::debug!(depth = MAX_DEPTH, "Markup nested too deeply, truncating");
                    break;
                }
                stack.push(start_element(&e, &reader));
            }
            Event::Empty(e) => {
                let element = start_element(&e, &reader);
                attach(&mut stack, &mut root, element);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(pos) = stack.iter().rposition(|el| el.name == name) {
                    while stack.len() > pos {
                        if let Some(element) = stack.pop() {
                            attach(&mut stack, &mut root, element);
                        }
                    }
                }
            }
            Event::Text(e) => {
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                push_text(&mut stack, text);
            }
            Event::CData(e) => {
                push_text(&mut stack, String::from_utf8_lossy(&e).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }

        if root.is_some() && stack.is_empty() {
            break;
        }
    }

    while let Some(element) = stack.pop() {
        attach(&mut stack, &mut root, element);
    }

    root
}
