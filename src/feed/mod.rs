//! Feed parsing and subscription discovery.
//!
//! - **Detection**: [`detect_format`] sniffs JSON vs. the XML root element
//! - **Parsing**: one parser per dialect, all converging on [`Feed`]/[`Entry`]
//! - **Discovery**: [`find_subscriptions`] locates feeds behind a website URL
//!
//! # Example
//!
//! ```
//! use feedwright::feed::parse_feed;
//!
//! let feed = parse_feed(
//!     "https://example.org/feed.xml",
//!     "<rss><channel><title>Hi</title><item><title>One</title></item></channel></rss>",
//! )
//! .unwrap();
//! assert_eq!(feed.title, "Hi");
//! assert_eq!(feed.entries[0].title, "One");
//! ```

mod atom;
mod discovery;
mod format;
mod json;
mod media;
mod model;
mod rdf;
mod rss;
mod xml;

use thiserror::Error;

pub use discovery::{find_subscriptions, DiscoveryError, FinderOptions, Subscription};
pub use format::{detect_format, is_atom03, FeedFormat};
pub use model::{Enclosure, Entry, Feed};
pub use xml::XmlError;

use atom::AtomFeed;
use json::JsonFeed;
use rdf::RdfFeed;
use rss::RssFeed;

/// Errors returned by [`parse_feed`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("This feed is empty")]
    EmptyFeed,

    #[error("Unsupported feed format")]
    UnsupportedFormat,

    #[error("Unable to parse XML feed: {0}")]
    Xml(#[from] xml::XmlError),

    #[error("Unable to parse JSON feed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected root element <{0}>")]
    UnexpectedRoot(String),
}

impl ParseError {
    /// Stable translation key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            ParseError::EmptyFeed => "error.feed_empty",
            ParseError::UnsupportedFormat => "error.feed_format_not_detected",
            ParseError::Xml(_) => "error.feed_xml",
            ParseError::Json(_) => "error.feed_json",
            ParseError::UnexpectedRoot(_) => "error.feed_unexpected_root",
        }
    }
}

/// A decoded dialect document that can be mapped onto the common model.
pub(crate) trait IntoFeed {
    /// `base_url` is the URL the document was fetched from; relative links
    /// resolve against it (or against the feed's own self link).
    fn into_feed(self, base_url: &str) -> Feed;
}

/// Detects the format of `data` and parses it into a [`Feed`].
///
/// # Errors
///
/// - [`ParseError::EmptyFeed`] for blank input
/// - [`ParseError::UnsupportedFormat`] when no dialect is recognized
/// - [`ParseError::Xml`] / [`ParseError::Json`] for undecodable documents
pub fn parse_feed(base_url: &str, data: &str) -> Result<Feed, ParseError> {
    if data.trim().is_empty() {
        return Err(ParseError::EmptyFeed);
    }

    let format = detect_format(data);
    tracing::debug!(url = %base_url, format = %format, "Parsing feed");

    let feed = match format {
        FeedFormat::Json => JsonFeed::from_json(data)?.into_feed(base_url),
        FeedFormat::Atom => AtomFeed::from_element(xml::parse(data)?, is_atom03(data))?.into_feed(base_url),
        FeedFormat::Rss => RssFeed::from_element(xml::parse(data)?)?.into_feed(base_url),
        FeedFormat::Rdf => RdfFeed::from_element(xml::parse(data)?)?.into_feed(base_url),
        FeedFormat::Unknown => return Err(ParseError::UnsupportedFormat),
    };

    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_feed("https://a/", "  \n"), Err(ParseError::EmptyFeed)));
    }

    #[test]
    fn test_unsupported_format() {
        let err = parse_feed("https://a/", "<html><body>hi</body></html>").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat));
        assert_eq!(err.key(), "error.feed_format_not_detected");
    }

    #[test]
    fn test_malformed_xml_is_unsupported() {
        assert!(parse_feed("https://a/", "<not valid xml").is_err());
    }

    #[test]
    fn test_titles_and_urls_never_empty() {
        let documents = [
            "<rss><channel><item/></channel></rss>",
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry/></feed>"#,
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/"><item/></rdf:RDF>"#,
            r#"{"items": [{}]}"#,
        ];

        for document in documents {
            let feed = parse_feed("https://example.org/feed", document).unwrap();
            assert!(!feed.title.is_empty(), "{document}");
            assert_eq!(feed.entries.len(), 1, "{document}");
            for entry in &feed.entries {
                assert!(!entry.title.is_empty(), "{document}");
                assert!(!entry.url.is_empty(), "{document}");
                assert!(!entry.hash.is_empty(), "{document}");
            }
        }
    }
}
