//! JSON Feed 1.0 and 1.1.

use serde::Deserialize;
use serde_json::Value;

use super::model::{
    first_non_empty, normalize_tags, title_from_content, Enclosure, EnclosureSet, Entry, Feed,
};
use super::{IntoFeed, ParseError};
use crate::date::parse_or_now;
use crate::util::{absolute_url, escape_html, hash, strip_tags};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JsonFeed {
    title: Option<String>,
    home_page_url: Option<String>,
    feed_url: Option<String>,
    icon: Option<String>,
    favicon: Option<String>,
    author: Option<Value>,
    authors: Option<Vec<Value>>,
    items: Option<Vec<JsonItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonItem {
    id: Option<Value>,
    url: Option<String>,
    external_url: Option<String>,
    title: Option<String>,
    content_html: Option<String>,
    content_text: Option<String>,
    summary: Option<String>,
    image: Option<String>,
    date_published: Option<String>,
    date_modified: Option<String>,
    author: Option<Value>,
    authors: Option<Vec<Value>>,
    tags: Option<Vec<Value>>,
    attachments: Option<Vec<JsonAttachment>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonAttachment {
    url: Option<String>,
    mime_type: Option<String>,
    size_in_bytes: Option<Value>,
}

impl JsonFeed {
    pub fn from_json(data: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Ids and sizes show up as numbers or strings; both are accepted.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Author names from a 1.1 `authors` list or a 1.0 `author` object.
fn author_names(authors: Option<&[Value]>, author: Option<&Value>) -> Option<String> {
    let name = |value: &Value| match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_owned()),
        _ => None,
    }
    .filter(|s| !s.is_empty());

    let from_list = authors
        .map(|list| list.iter().filter_map(name).collect::<Vec<_>>().join(", "))
        .filter(|names| !names.is_empty());

    from_list.or_else(|| author.and_then(name)).map(|a| strip_tags(&a))
}

impl JsonItem {
    fn transform(self, feed: &Feed, feed_author: &str) -> Entry {
        let link = first_non_empty([self.url.as_deref(), self.external_url.as_deref()])
            .map(|u| absolute_url(&feed.site_url, &u))
            .filter(|u| !u.is_empty());
        let url = link.clone().unwrap_or_else(|| feed.site_url.clone());

        let content = first_non_empty([
            self.content_html.clone(),
            self.content_text.as_deref().map(|t| escape_html(t).into_owned()),
            self.summary.clone(),
        ])
        .unwrap_or_default();

        let title = first_non_empty([self.title.as_deref().map(strip_tags)])
            .or_else(|| {
                [self.summary.as_deref(), self.content_text.as_deref(), self.content_html.as_deref()]
                    .into_iter()
                    .flatten()
                    .find_map(title_from_content)
            })
            .unwrap_or_else(|| url.clone());

        let id = self.id.as_ref().and_then(scalar_string);
        let hash = match first_non_empty([id, link.clone()]) {
            Some(identity) => hash(&identity),
            None => hash(&format!("{title}{content}")),
        };

        let raw_date = first_non_empty([self.date_published.as_deref(), self.date_modified.as_deref()]);

        let author = author_names(self.authors.as_deref(), self.author.as_ref())
            .unwrap_or_else(|| feed_author.to_owned());

        let mut enclosures = EnclosureSet::default();
        if let Some(image) = self.image.as_deref() {
            enclosures.push(Enclosure::new(absolute_url(&feed.site_url, image.trim()), "image/*", 0));
        }
        for attachment in self.attachments.unwrap_or_default() {
            let Some(href) = attachment.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
                continue;
            };
            enclosures.push(Enclosure::new(
                absolute_url(&feed.site_url, href),
                attachment.mime_type.unwrap_or_default(),
                attachment.size_in_bytes.as_ref().map_or(0, scalar_u64),
            ));
        }

        let tags = normalize_tags(self.tags.unwrap_or_default().iter().filter_map(scalar_string));

        Entry {
            title,
            url,
            comments_url: String::new(),
            author,
            content,
            date: parse_or_now(raw_date.as_deref()),
            hash,
            enclosures: enclosures.into_vec(),
            tags,
        }
    }
}

impl IntoFeed for JsonFeed {
    fn into_feed(self, base_url: &str) -> Feed {
        let feed_url = self
            .feed_url
            .as_deref()
            .map(|u| absolute_url(base_url, u.trim()))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| base_url.to_owned());

        let site_url = self
            .home_page_url
            .as_deref()
            .map(|u| absolute_url(base_url, u.trim()))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| feed_url.clone());

        let title = first_non_empty([self.title.as_deref()]).unwrap_or_else(|| site_url.clone());

        let icon_url = first_non_empty([self.icon.as_deref(), self.favicon.as_deref()])
            .map(|icon| absolute_url(&site_url, &icon));

        let feed_author = author_names(self.authors.as_deref(), self.author.as_ref()).unwrap_or_default();

        let mut feed = Feed {
            title,
            site_url,
            feed_url,
            icon_url,
            ttl_minutes: None,
            entries: Vec::new(),
        };

        let entries: Vec<Entry> = self
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.transform(&feed, &feed_author))
            .collect();
        feed.entries = entries;
        feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://example.org/feed.json";

    #[test]
    fn test_json_feed() {
        let data = r#"{
            "version": "https://jsonfeed.org/version/1.1",
            "title": "My Example Feed",
            "home_page_url": "https://example.org/",
            "feed_url": "https://example.org/feed.json",
            "favicon": "/favicon.ico",
            "author": {"name": "Feed Author"},
            "items": [
                {
                    "id": 2,
                    "content_text": "This is a second item.",
                    "url": "https://example.org/second-item",
                    "date_published": "2010-02-07T14:04:00-05:00",
                    "tags": ["a", "a", "b"],
                    "attachments": [
                        {"url": "https://example.org/ep.mp3", "mime_type": "audio/mpeg", "size_in_bytes": "1234"},
                        {"url": "", "mime_type": "audio/mpeg"}
                    ]
                },
                {
                    "id": "1",
                    "title": "Hello",
                    "content_html": "<p>Hello, world!</p>",
                    "url": "/first-item",
                    "authors": [{"name": "Item Author"}, {"name": "Second"}]
                }
            ]
        }"#;

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.title, "My Example Feed");
        assert_eq!(feed.site_url, "https://example.org/");
        assert_eq!(feed.icon_url.as_deref(), Some("https://example.org/favicon.ico"));

        let second = &feed.entries[0];
        assert_eq!(second.title, "This is a second item.");
        assert_eq!(second.hash, hash("2"));
        assert_eq!(second.author, "Feed Author");
        assert_eq!(second.date.to_rfc3339(), "2010-02-07T19:04:00+00:00");
        assert_eq!(second.tags, vec!["a", "b"]);
        assert_eq!(
            second.enclosures,
            vec![Enclosure::new("https://example.org/ep.mp3", "audio/mpeg", 1234)]
        );

        let first = &feed.entries[1];
        assert_eq!(first.title, "Hello");
        assert_eq!(first.url, "https://example.org/first-item");
        assert_eq!(first.author, "Item Author, Second");
        assert_eq!(first.content, "<p>Hello, world!</p>");
    }

    #[test]
    fn test_title_fallbacks_truncate() {
        let long = "x".repeat(150);
        let data = format!(
            r#"{{"items": [{{"summary": "Short summary"}}, {{"content_html": "<b>{long}</b>"}}, {{"url": "https://example.org/u"}}]}}"#
        );

        let feed = parse_feed(BASE, &data).unwrap();
        assert_eq!(feed.title, BASE);
        assert_eq!(feed.entries[0].title, "Short summary");
        assert_eq!(feed.entries[1].title.chars().count(), 101);
        assert!(feed.entries[1].title.ends_with('…'));
        assert_eq!(feed.entries[2].title, "https://example.org/u");
    }

    #[test]
    fn test_null_items_means_no_entries() {
        let feed = parse_feed(BASE, r#"{"version": "https://jsonfeed.org/version/1.1", "title": "Quiet", "items": null}"#).unwrap();
        assert_eq!(feed.title, "Quiet");
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_home_page_resolves_against_fetch_url() {
        let feed = parse_feed(
            BASE,
            r#"{"feed_url": "https://mirror.example.net/feed.json", "home_page_url": "/", "items": []}"#,
        )
        .unwrap();
        assert_eq!(feed.feed_url, "https://mirror.example.net/feed.json");
        assert_eq!(feed.site_url, "https://example.org/");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let err = parse_feed(BASE, "{ not json").unwrap_err();
        assert_eq!(err.key(), "error.feed_json");
    }
}
