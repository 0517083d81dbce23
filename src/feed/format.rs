use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use crate::util::strip_invalid_xml_chars;

/// Syndication dialects recognized by [`detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Atom,
    Rss,
    Rdf,
    Json,
    Unknown,
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeedFormat::Atom => "atom",
            FeedFormat::Rss => "rss",
            FeedFormat::Rdf => "rdf",
            FeedFormat::Json => "json",
            FeedFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies `data` by its first significant token.
///
/// A leading `{` means JSON Feed. Otherwise XML tokens are scanned until the
/// first element, whose local name picks the dialect.
pub fn detect_format(data: &str) -> FeedFormat {
    let trimmed = data.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if trimmed.starts_with('{') {
        return FeedFormat::Json;
    }

    let cleaned = strip_invalid_xml_chars(trimmed);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().check_end_names = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.local_name();
                return match local.as_ref() {
                    b"rss" => FeedFormat::Rss,
                    b"feed" => FeedFormat::Atom,
                    b"RDF" => FeedFormat::Rdf,
                    _ => FeedFormat::Unknown,
                };
            }
            Ok(Event::Eof) | Err(_) => return FeedFormat::Unknown,
            Ok(_) => {}
        }
    }
}

/// True for an Atom 0.3 document: `version="0.3"` on the root, or the 0.3
/// namespace.
pub fn is_atom03(data: &str) -> bool {
    let cleaned = strip_invalid_xml_chars(data);
    let mut reader = Reader::from_str(&cleaned);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e.attributes().with_checks(false).flatten().any(|attr| {
                    let value = String::from_utf8_lossy(&attr.value);
                    match attr.key.as_ref() {
                        b"version" => value.trim() == "0.3",
                        b"xmlns" => value.trim() == super::xml::ns::ATOM03,
                        _ => false,
                    }
                });
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_json() {
        assert_eq!(detect_format("  \n{\"version\": \"x\"}"), FeedFormat::Json);
    }

    #[test]
    fn test_detect_xml_roots() {
        assert_eq!(
            detect_format(r#"<?xml version="1.0"?><!-- c --><rss version="2.0"></rss>"#),
            FeedFormat::Rss
        );
        assert_eq!(
            detect_format(r#"<feed xmlns="http://www.w3.org/2005/Atom"/>"#),
            FeedFormat::Atom
        );
        assert_eq!(
            detect_format(r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"></rdf:RDF>"#),
            FeedFormat::Rdf
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format("<html><body/></html>"), FeedFormat::Unknown);
        assert_eq!(detect_format("plain text"), FeedFormat::Unknown);
        assert_eq!(detect_format(""), FeedFormat::Unknown);
    }

    #[test]
    fn test_atom_version() {
        assert!(is_atom03(r#"<feed version="0.3" xmlns="http://purl.org/atom/ns#"></feed>"#));
        assert!(is_atom03(r#"<feed xmlns="http://purl.org/atom/ns#"></feed>"#));
        assert!(!is_atom03(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#));
    }
}
