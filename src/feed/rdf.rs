//! RDF Site Summary (RSS 1.0 and 0.90).
//!
//! Items are siblings of the channel under `rdf:RDF`. Only Dublin Core and
//! `content:encoded` extend the core vocabulary here; there are no enclosures.

use super::model::{first_non_empty, normalize_tags, title_from_content, Entry, Feed};
use super::xml::{ns, Element};
use super::{IntoFeed, ParseError};
use crate::date::parse_or_now;
use crate::util::{absolute_url, collapse_whitespace, hash, strip_tags};

fn is_rss10(namespace: &str) -> bool {
    namespace == ns::RSS10 || namespace == ns::RSS090 || namespace.is_empty()
}

fn rss_text(e: &Element, name: &str) -> Option<String> {
    e.child_where(name, is_rss10)
        .map(Element::text)
        .filter(|t| !t.is_empty())
}

#[derive(Debug)]
pub struct RdfFeed {
    root: Element,
}

impl RdfFeed {
    pub fn from_element(root: Element) -> Result<Self, ParseError> {
        if root.name != "RDF" {
            return Err(ParseError::UnexpectedRoot(root.name));
        }
        Ok(Self { root })
    }

    fn items(&self) -> impl Iterator<Item = &Element> {
        let nested = self
            .root
            .child_where("channel", is_rss10)
            .into_iter()
            .flat_map(|channel| channel.elements());
        self.root
            .elements()
            .chain(nested)
            .filter(|e| e.name == "item" && is_rss10(&e.ns))
    }

    fn transform_item(item: &Element, feed: &Feed, feed_author: &str) -> Entry {
        let link = rss_text(item, "link")
            .map(|href| absolute_url(&feed.site_url, &href))
            .filter(|u| !u.is_empty());
        let url = link.clone().unwrap_or_else(|| feed.site_url.clone());

        let description = rss_text(item, "description");
        let content = first_non_empty([item.child_text(ns::CONTENT, "encoded"), description.clone()])
            .unwrap_or_default();

        let raw_title = rss_text(item, "title");
        let title = first_non_empty([
            raw_title.as_deref().map(|t| collapse_whitespace(&strip_tags(t))),
            title_from_content(&content),
        ])
        .unwrap_or_else(|| url.clone());

        let hash = match link.as_deref() {
            Some(link) => hash(link),
            None => hash(&format!(
                "{}{}",
                raw_title.unwrap_or_default(),
                description.unwrap_or_default()
            )),
        };

        let author = item
            .child_text(ns::DC, "creator")
            .map(|a| strip_tags(&a))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| feed_author.to_owned());

        Entry {
            title,
            url,
            comments_url: String::new(),
            author,
            content,
            date: parse_or_now(item.child_text(ns::DC, "date").as_deref()),
            hash,
            enclosures: Vec::new(),
            tags: normalize_tags(item.children(ns::DC, "subject").map(Element::text)),
        }
    }
}

impl IntoFeed for RdfFeed {
    fn into_feed(self, base_url: &str) -> Feed {
        let channel = self.root.child_where("channel", is_rss10);

        let site_url = channel
            .and_then(|c| rss_text(c, "link"))
            .map(|link| absolute_url(base_url, &link))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| base_url.to_owned());

        let title = channel
            .and_then(|c| rss_text(c, "title"))
            .map(|t| collapse_whitespace(&strip_tags(&t)))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| site_url.clone());

        let icon_url = self
            .root
            .child_where("image", is_rss10)
            .and_then(|image| rss_text(image, "url"))
            .map(|icon| absolute_url(&site_url, &icon));

        let feed_author = channel
            .and_then(|c| {
                first_non_empty([c.child_text(ns::DC, "creator"), c.child_text(ns::DC, "publisher")])
            })
            .map(|a| strip_tags(&a))
            .unwrap_or_default();

        let mut feed = Feed {
            title,
            site_url,
            feed_url: base_url.to_owned(),
            icon_url,
            ttl_minutes: None,
            entries: Vec::new(),
        };

        let entries: Vec<Entry> = self
            .items()
            .map(|item| Self::transform_item(item, &feed, &feed_author))
            .collect();
        feed.entries = entries;
        feed
    }
}
