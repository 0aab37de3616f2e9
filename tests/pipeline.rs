//! Integration tests for the ingestion pipeline: validate, load, load_multiple.
//!
//! Each test starts its own wiremock server. Private hosts are allowed so the
//! parser can reach the mock on localhost.

use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

use rss_feed::config::Config;
use rss_feed::feed::{Parser, Source};

fn test_config() -> Config {
    Config {
        allow_private_hosts: true,
        retry_base_delay_ms: 10,
        ..Config::default()
    }
}

fn rss_feed(title: &str, links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| format!("<item><title>{link}</title><link>{link}</link></item>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>{title}</title><link>https://example.com/</link>{items}</channel></rss>"#
    )
}

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <link rel="alternate" href="https://atom.example.com/"/>
  <entry><title>Third</title><link href="/c"/><updated>2024-03-01T00:00:00Z</updated></entry>
  <entry><title>First</title><link href="/a"/><updated>2024-01-01T00:00:00Z</updated></entry>
  <entry><title>Second</title><link href="/b"/><updated>2024-02-01T00:00:00Z</updated></entry>
</feed>"#;

async fn mount_body(server: &MockServer, at: &str, body: impl Into<String>) {
    Mock::given(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

fn source(url: String) -> Source {
    Source::new(url)
}

// ============================================================================
// load
// ============================================================================

#[tokio::test]
async fn test_load_rss_preserves_document_order() {
    let server = MockServer::start().await;
    let links = [
        "https://example.com/z",
        "https://example.com/a",
        "https://example.com/m",
    ];
    mount_body(&server, "/rss.xml", rss_feed("Ordered", &links)).await;

    let mut parser = Parser::new(test_config()).unwrap();
    let url = format!("{}/rss.xml", server.uri());
    parser.load(&url).await;

    let source = parser.source().expect("feed should load");
    assert_eq!(source.url, url);
    assert_eq!(source.title.as_deref(), Some("Ordered"));

    let got: Vec<_> = parser.posts().iter().map(|p| p.link.as_str()).collect();
    assert_eq!(got, links.to_vec());
    assert!(parser.posts().iter().all(|p| p.feed_url == url));
}

#[tokio::test]
async fn test_load_atom_keeps_entry_order_not_date_order() {
    let server = MockServer::start().await;
    mount_body(&server, "/atom.xml", ATOM).await;

    let mut parser = Parser::new(test_config()).unwrap();
    parser.load(&format!("{}/atom.xml", server.uri())).await;

    assert_eq!(
        parser.source().and_then(|s| s.title.as_deref()),
        Some("Atom Example")
    );
    let titles: Vec<_> = parser.posts().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "First", "Second"]);
    assert_eq!(parser.posts()[1].link, "https://atom.example.com/a");
}

#[tokio::test]
async fn test_load_redirect_uses_final_url() {
    let server = MockServer::start().await;
    let target = format!("{}/moved.xml", server.uri());
    Mock::given(path("/feed"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", target.as_str()))
        .mount(&server)
        .await;
    mount_body(&server, "/moved.xml", rss_feed("Moved", &["https://example.com/1"])).await;

    let mut parser = Parser::new(test_config()).unwrap();
    parser.load(&format!("{}/feed", server.uri())).await;

    let source = parser.source().expect("feed should load");
    assert_eq!(source.url, target);
    assert_eq!(parser.posts()[0].feed_url, target);
}

#[tokio::test]
async fn test_load_decodes_declared_encoding() {
    let server = MockServer::start().await;
    let body: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
<rss version=\"2.0\"><channel><title>Caf\xe9 News</title>\
<item><title>Cr\xe8me br\xfbl\xe9e</title><link>https://example.com/1</link></item>\
</channel></rss>";
    Mock::given(path("/latin1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml"))
        .mount(&server)
        .await;

    let mut parser = Parser::new(test_config()).unwrap();
    parser.load(&format!("{}/latin1.xml", server.uri())).await;

    assert_eq!(
        parser.source().and_then(|s| s.title.as_deref()),
        Some("Café News")
    );
    assert_eq!(parser.posts()[0].title, "Crème brûlée");
}

#[tokio::test]
async fn test_load_non_feed_leaves_no_source() {
    let server = MockServer::start().await;
    mount_body(&server, "/page", "<html><body>Not a feed</body></html>").await;

    let mut parser = Parser::new(test_config()).unwrap();
    parser.load(&format!("{}/page", server.uri())).await;
    assert!(parser.source().is_none());
    assert!(parser.posts().is_empty());
}

#[tokio::test]
async fn test_load_http_error_leaves_no_source() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut parser = Parser::new(test_config()).unwrap();
    parser.load(&format!("{}/missing", server.uri())).await;
    assert!(parser.source().is_none());
    assert!(parser.posts().is_empty());
}

// ============================================================================
// is_valid
// ============================================================================

#[tokio::test]
async fn test_is_valid_resolves_redirect() {
    let server = MockServer::start().await;
    let target = format!("{}/final.xml", server.uri());
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", target.as_str()))
        .mount(&server)
        .await;
    mount_body(&server, "/final.xml", ATOM).await;

    let parser = Parser::new(test_config()).unwrap();
    let mut src = source(format!("{}/old", server.uri()));
    assert!(parser.is_valid(&mut src).await);
    assert_eq!(src.url, target);
}

#[tokio::test]
async fn test_is_valid_follows_auto_discovery() {
    let server = MockServer::start().await;
    mount_body(
        &server,
        "/blog",
        r#"<!DOCTYPE html><html><head>
            <title>Blog</title>
            <link rel="alternate" type="application/rss+xml" title="Feed" href="/blog/rss">
        </head><body><h1>Blog</h1></body></html>"#,
    )
    .await;
    mount_body(&server, "/blog/rss", rss_feed("Blog", &["https://example.com/1"])).await;

    let parser = Parser::new(test_config()).unwrap();
    let mut src = source(format!("{}/blog", server.uri()));
    assert!(parser.is_valid(&mut src).await);
    assert_eq!(src.url, format!("{}/blog/rss", server.uri()));
}

#[tokio::test]
async fn test_is_valid_false_for_plain_page() {
    let server = MockServer::start().await;
    mount_body(&server, "/", "<html><head></head><body>Hello</body></html>").await;

    let parser = Parser::new(test_config()).unwrap();
    let original = format!("{}/", server.uri());
    let mut src = source(original.clone());
    assert!(!parser.is_valid(&mut src).await);
    assert_eq!(src.url, original);
}

// ============================================================================
// load_multiple
// ============================================================================

#[tokio::test]
async fn test_load_multiple_skips_unreachable_source() {
    let server = MockServer::start().await;
    mount_body(&server, "/a.xml", rss_feed("A", &["https://a.example.com/1", "https://a.example.com/2"])).await;
    mount_body(&server, "/b.xml", ATOM).await;

    let sources = vec![
        source(format!("{}/a.xml", server.uri())),
        // Port 1 is reserved and closed on test hosts
        source("http://127.0.0.1:1/feed.xml".to_owned()),
        source(format!("{}/b.xml", server.uri())),
    ];

    let parser = Parser::new(test_config()).unwrap();
    let posts = parser.load_multiple(&sources).await;

    assert_eq!(posts.len(), 5);
    assert!(posts.iter().all(|p| !p.feed_url.contains("127.0.0.1:1")));
}

#[tokio::test]
async fn test_load_multiple_across_batches_returns_union() {
    let server = MockServer::start().await;
    let mut sources = Vec::new();
    for i in 0..25 {
        let link = format!("https://example.com/post/{i}");
        mount_body(&server, &format!("/feed/{i}"), rss_feed(&format!("Feed {i}"), &[&link])).await;
        sources.push(source(format!("{}/feed/{i}", server.uri())));
    }

    let parser = Parser::new(test_config()).unwrap();
    let started = Instant::now();
    let posts = parser.load_multiple(&sources).await;

    assert!(started.elapsed() < Duration::from_secs(30));
    let mut links: Vec<_> = posts.iter().map(|p| p.link.clone()).collect();
    links.sort();
    let mut expected: Vec<_> = (0..25).map(|i| format!("https://example.com/post/{i}")).collect();
    expected.sort();
    assert_eq!(links, expected);
}

#[tokio::test]
async fn test_load_multiple_keeps_per_source_order() {
    let server = MockServer::start().await;
    let a_links = ["https://a.example.com/3", "https://a.example.com/1", "https://a.example.com/2"];
    mount_body(&server, "/a.xml", rss_feed("A", &a_links)).await;
    mount_body(&server, "/b.xml", ATOM).await;

    let sources = vec![
        source(format!("{}/a.xml", server.uri())),
        source(format!("{}/b.xml", server.uri())),
    ];
    let parser = Parser::new(test_config()).unwrap();
    let posts = parser.load_multiple(&sources).await;

    let a_url = format!("{}/a.xml", server.uri());
    let from_a: Vec<_> = posts
        .iter()
        .filter(|p| p.feed_url == a_url)
        .map(|p| p.link.as_str())
        .collect();
    assert_eq!(from_a, a_links.to_vec());
}

#[tokio::test]
async fn test_load_multiple_skips_invisible_sources() {
    let server = MockServer::start().await;
    mount_body(&server, "/shown.xml", rss_feed("Shown", &["https://example.com/shown"])).await;
    Mock::given(path("/hidden.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed("Hidden", &["https://example.com/hidden"])))
        .expect(0)
        .mount(&server)
        .await;

    let hidden = Source {
        visible: false,
        ..Source::new(format!("{}/hidden.xml", server.uri()))
    };
    let sources = vec![source(format!("{}/shown.xml", server.uri())), hidden];

    let parser = Parser::new(test_config()).unwrap();
    let posts = parser.load_multiple(&sources).await;

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].link, "https://example.com/shown");
}

#[tokio::test]
async fn test_load_multiple_deadline_returns_partial_results() {
    let server = MockServer::start().await;
    mount_body(&server, "/fast1.xml", rss_feed("Fast 1", &["https://example.com/fast1"])).await;
    mount_body(&server, "/fast2.xml", rss_feed("Fast 2", &["https://example.com/fast2"])).await;
    Mock::given(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed("Slow", &["https://example.com/slow"]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let config = Config {
        batch_width: 2,
        batch_deadline_secs: 2,
        ..test_config()
    };
    // Unit 1: fast1 then slow; unit 2: fast2
    let sources = vec![
        source(format!("{}/fast1.xml", server.uri())),
        source(format!("{}/slow.xml", server.uri())),
        source(format!("{}/fast2.xml", server.uri())),
    ];

    let parser = Parser::new(config).unwrap();
    let started = Instant::now();
    let posts = parser.load_multiple(&sources).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2), "returned before the deadline: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "deadline not honored: {elapsed:?}");

    let mut links: Vec<_> = posts.iter().map(|p| p.link.as_str()).collect();
    links.sort_unstable();
    assert_eq!(links, vec!["https://example.com/fast1", "https://example.com/fast2"]);
}
