//! Response body transcoding to UTF-8.
//!
//! Signals in priority order: a byte-order mark, bytes that already validate
//! as UTF-8, the document's own declaration (XML prolog or HTML `<meta>`), the
//! `charset` parameter of the Content-Type header. Without any usable signal
//! the body is read as Windows-1252.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::sync::LazyLock;

/// Only this many leading bytes are searched for a declaration.
const SNIFF_LEN: usize = 1024;

static XML_DECLARATION_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r#"(?i)<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:\-]+)["']"#)
        .expect("xml declaration pattern is valid")
});

static META_CHARSET_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r#"(?i)<meta[^>]+?charset\s*=\s*["']?\s*([A-Za-z0-9._:\-]+)"#)
        .expect("meta charset pattern is valid")
});

static CONTENT_TYPE_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^\s;"']+)"#).expect("charset pattern is valid")
});

/// Extracts the `charset` parameter of a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    CONTENT_TYPE_CHARSET_RE
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn declared_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(SNIFF_LEN)];
    XML_DECLARATION_RE
        .captures(head)
        .or_else(|| META_CHARSET_RE.captures(head))
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Decodes `body` to UTF-8 text.
///
/// Invalid sequences in the chosen encoding are replaced with U+FFFD rather
/// than failing.
pub fn to_utf8(body: &[u8], content_type: &str) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(body) {
        let (text, _) = encoding.decode_without_bom_handling(&body[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_owned();
    }

    let declared = declared_charset(body);
    let encoding = declared
        .as_deref()
        .into_iter()
        .chain(charset_from_content_type(content_type))
        .find_map(|label| {
            let found = Encoding::for_label(label.trim().as_bytes());
            if found.is_none() {
                tracing::debug!(label = %label, "Ignoring unknown charset label");
            }
            found
        })
        .unwrap_or(WINDOWS_1252);

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        tracing::debug!(
            encoding = encoding.name(),
            utf8 = encoding == UTF_8,
            "Body contained sequences invalid for its encoding"
        );
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_utf8_passes_through_despite_wrong_header() {
        let body = "<rss><title>Café</title></rss>".as_bytes();
        assert_eq!(to_utf8(body, "text/xml; charset=iso-8859-1"), "<rss><title>Café</title></rss>");
    }

    #[test]
    fn test_xml_declaration_wins_over_header() {
        let mut body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><t>"#.to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</t>");

        let text = to_utf8(&body, "text/xml; charset=koi8-r");
        assert!(text.ends_with("<t>é</t>"), "{text}");
    }

    #[test]
    fn test_header_charset_used_without_declaration() {
        // "Привет" in windows-1251
        let body = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        assert_eq!(to_utf8(&body, "text/html; charset=\"windows-1251\""), "Привет");
    }

    #[test]
    fn test_html_meta_charset() {
        let mut body = br#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=iso-8859-15"></head><body>"#.to_vec();
        body.push(0xA4);
        let text = to_utf8(&body, "text/html");
        assert!(text.ends_with('€'), "{text}");
    }

    #[test]
    fn test_unknown_label_falls_back_to_windows_1252() {
        let body = [b'a', 0x93, b'b', 0x94];
        assert_eq!(to_utf8(&body, "text/plain; charset=bogus"), "a\u{201c}b\u{201d}");
    }

    #[test]
    fn test_bom_selects_encoding() {
        let body = [0xFF, 0xFE, b'h', 0x00, b'i', 0x00];
        assert_eq!(to_utf8(&body, "text/xml; charset=utf-8"), "hi");
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(charset_from_content_type("text/xml; Charset=UTF-8"), Some("UTF-8"));
        assert_eq!(charset_from_content_type("application/rss+xml"), None);
    }
}
