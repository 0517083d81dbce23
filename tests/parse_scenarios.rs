//! Integration tests for parsing real-world shaped documents of every dialect.
//!
//! These run the public `parse_feed` entry point only; dialect internals are
//! covered by the unit tests next to each parser.

use chrono::{TimeZone, Utc};
use feedwright::date::parse_date;
use feedwright::feed::{detect_format, parse_feed, FeedFormat};
use pretty_assertions::assert_eq;

const ATOM_MINIMAL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Feed</title>
  <link href="http://example.org/"/>
  <updated>2003-12-13T18:30:02Z</updated>
  <author><name>John Doe</name></author>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <entry>
    <title>Atom-Powered Robots Run Amok</title>
    <link href="http://example.org/2003/12/13/atom03"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2003-12-13T18:30:02Z</updated>
    <summary>Some text.</summary>
  </entry>
</feed>"#;

const PODCAST_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"
     xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:media="http://search.yahoo.com/mrss/"
     xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Weekly Show</title>
    <link>https://podcast.example.com/</link>
    <itunes:author>The Hosts</itunes:author>
    <ttl>60</ttl>
    <item>
      <title>Episode 1</title>
      <link>/episodes/1</link>
      <guid isPermaLink="false">episode-1</guid>
      <pubDate>Tue, 10 Jun 2003 04:00:00 GMT</pubDate>
      <description>First &amp; best</description>
      <enclosure url="https://cdn.example.com/ep1.mp3" length="12345" type="audio/mpeg"/>
      <media:content url="https://cdn.example.com/ep1.mp3" type="audio/mpeg" fileSize="999"/>
      <category>Tech</category>
      <dc:subject>tech</dc:subject>
      <category>Tech</category>
    </item>
    <item>
      <description>No title here, only a description that becomes the title.</description>
      <enclosure url="" length="0"/>
    </item>
  </channel>
</rss>"#;

const RDF_FEED: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://rdf.example.org/">
    <title>RDF Site</title>
    <link>https://rdf.example.org/</link>
  </channel>
  <item rdf:about="https://rdf.example.org/a">
    <title>First</title>
    <link>https://rdf.example.org/a</link>
    <dc:date>2024-02-03T04:05:06+01:00</dc:date>
    <dc:creator>Ann</dc:creator>
  </item>
</rdf:RDF>"#;

const JSON_FEED: &str = r#"{
  "version": "https://jsonfeed.org/version/1.1",
  "title": "JSON Blog",
  "home_page_url": "https://json.example.org/",
  "feed_url": "https://json.example.org/feed.json",
  "items": [
    {
      "id": 42,
      "url": "https://json.example.org/posts/42",
      "content_html": "<p>Hello</p>",
      "date_published": "2024-05-06T07:08:09Z",
      "authors": [{"name": "Jo"}],
      "tags": ["rust", " rust ", ""],
      "attachments": [{"url": "https://json.example.org/a.mp3", "mime_type": "audio/mpeg", "size_in_bytes": 10}]
    }
  ]
}"#;

#[test]
fn test_atom_minimal_entry() {
    let feed = parse_feed("http://example.org/feed.atom", ATOM_MINIMAL).unwrap();

    assert_eq!(feed.title, "Example Feed");
    assert_eq!(feed.site_url, "http://example.org/");
    assert_eq!(feed.entries.len(), 1);

    let entry = &feed.entries[0];
    assert_eq!(entry.url, "http://example.org/2003/12/13/atom03");
    assert_eq!(entry.date, Utc.with_ymd_and_hms(2003, 12, 13, 18, 30, 2).unwrap());
    assert_eq!(entry.author, "John Doe");
    assert!(!entry.hash.is_empty());
}

#[test]
fn test_rss_podcast() {
    let feed = parse_feed("https://podcast.example.com/feed.xml", PODCAST_RSS).unwrap();

    assert_eq!(feed.title, "Weekly Show");
    assert_eq!(feed.ttl_minutes, Some(60));
    assert_eq!(feed.entries.len(), 2);

    let first = &feed.entries[0];
    assert_eq!(first.url, "https://podcast.example.com/episodes/1");
    assert_eq!(first.author, "The Hosts");
    assert_eq!(first.content, "First & best");
    assert_eq!(first.date, Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap());
    assert_eq!(first.enclosures.len(), 1, "same URL is kept once");
    assert_eq!(first.enclosures[0].size, 12345);
    assert_eq!(first.tags, vec!["Tech".to_owned(), "tech".to_owned()]);

    let second = &feed.entries[1];
    assert!(second.enclosures.is_empty(), "empty enclosure URL is dropped");
    assert!(second.title.starts_with("No title here"));
    assert_eq!(second.url, "https://podcast.example.com/");
}

#[test]
fn test_rdf_feed() {
    let feed = parse_feed("https://rdf.example.org/index.rdf", RDF_FEED).unwrap();

    assert_eq!(feed.title, "RDF Site");
    let entry = &feed.entries[0];
    assert_eq!(entry.url, "https://rdf.example.org/a");
    assert_eq!(entry.author, "Ann");
    assert_eq!(entry.date, Utc.with_ymd_and_hms(2024, 2, 3, 3, 5, 6).unwrap());
}

#[test]
fn test_json_feed() {
    let feed = parse_feed("https://json.example.org/feed.json", JSON_FEED).unwrap();

    assert_eq!(feed.title, "JSON Blog");
    assert_eq!(feed.site_url, "https://json.example.org/");
    let entry = &feed.entries[0];
    assert_eq!(entry.title, "Hello");
    assert_eq!(entry.author, "Jo");
    assert_eq!(entry.tags, vec!["rust".to_owned()]);
    assert_eq!(entry.enclosures.len(), 1);
    assert_eq!(entry.enclosures[0].mime_type, "audio/mpeg");
}

#[test]
fn test_hashes_are_stable_across_parses() {
    for (base, document) in [
        ("http://example.org/feed.atom", ATOM_MINIMAL),
        ("https://podcast.example.com/feed.xml", PODCAST_RSS),
        ("https://rdf.example.org/index.rdf", RDF_FEED),
        ("https://json.example.org/feed.json", JSON_FEED),
    ] {
        let first = parse_feed(base, document).unwrap();
        let second = parse_feed(base, document).unwrap();
        let hashes = |feed: &feedwright::feed::Feed| {
            feed.entries.iter().map(|e| e.hash.clone()).collect::<Vec<_>>()
        };
        assert_eq!(hashes(&first), hashes(&second), "{base}");
    }
}

#[test]
fn test_format_detection() {
    assert_eq!(detect_format(ATOM_MINIMAL), FeedFormat::Atom);
    assert_eq!(detect_format(PODCAST_RSS), FeedFormat::Rss);
    assert_eq!(detect_format(RDF_FEED), FeedFormat::Rdf);
    assert_eq!(detect_format(JSON_FEED), FeedFormat::Json);
    assert_eq!(detect_format("<html></html>"), FeedFormat::Unknown);
}

#[test]
fn test_date_boundaries() {
    assert!(parse_date("").is_err());
    assert!(parse_date("   ").is_err());
    assert_eq!(
        parse_date("1520932969").unwrap(),
        Utc.with_ymd_and_hms(2018, 3, 13, 9, 22, 49).unwrap()
    );
}
