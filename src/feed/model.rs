//! The normalized feed model every format parser converges on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::util::{strip_tags, truncate_chars};

/// Visible characters kept when a title is synthesized from content.
pub const SYNTHESIZED_TITLE_CHARS: usize = 100;

/// A parsed feed.
///
/// `title` is never empty and both URLs are absolute whenever the source
/// document (or the fetch URL) allowed resolving them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feed {
    pub title: String,
    pub site_url: String,
    pub feed_url: String,
    pub icon_url: Option<String>,
    /// RSS `<ttl>`, in minutes.
    pub ttl_minutes: Option<u32>,
    pub entries: Vec<Entry>,
}

/// One item of a feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub title: String,
    pub url: String,
    /// Absolute http(s) URL or empty.
    pub comments_url: String,
    pub author: String,
    /// Unsanitized HTML.
    pub content: String,
    pub date: DateTime<Utc>,
    /// Stable identity across fetches, see [`crate::util::hash`].
    pub hash: String,
    pub enclosures: Vec<Enclosure>,
    pub tags: Vec<String>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            title: String::new(),
            url: String::new(),
            comments_url: String::new(),
            author: String::new(),
            content: String::new(),
            date: Utc::now(),
            hash: String::new(),
            enclosures: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// A media attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    /// Zero when unknown.
    pub size: u64,
}

impl Enclosure {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

/// Collects enclosures in precedence order, keeping the first per URL.
#[derive(Debug, Default)]
pub(crate) struct EnclosureSet {
    items: Vec<Enclosure>,
}

impl EnclosureSet {
    pub fn push(&mut self, enclosure: Enclosure) {
        let url = enclosure.url.trim();
        if url.is_empty() || self.items.iter().any(|e| e.url == url) {
            return;
        }
        self.items.push(Enclosure {
            url: url.to_owned(),
            ..enclosure
        });
    }

    pub fn into_vec(self) -> Vec<Enclosure> {
        self.items
    }
}

/// Parses an enclosure length, treating anything invalid as unknown.
pub(crate) fn parse_size(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// First non-empty trimmed value.
pub(crate) fn first_non_empty<I, S>(values: I) -> Option<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flatten()
        .map(|v| v.as_ref().trim().to_owned())
        .find(|v| !v.is_empty())
}

/// A title built from the content's visible text, or `None` if there is none.
pub(crate) fn title_from_content(content: &str) -> Option<String> {
    let text = strip_tags(content);
    if text.is_empty() {
        return None;
    }
    Some(truncate_chars(&text, SYNTHESIZED_TITLE_CHARS).into_owned())
}

/// Trims, drops empties and removes duplicates while keeping order.
pub(crate) fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}
