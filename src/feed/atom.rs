//! Atom 1.0 (RFC 4287) and the legacy Atom 0.3 draft.
//!
//! Both dialects share links, persons and categories; they differ in how
//! content is typed (`type` vs. `type` + `mode`) and which elements carry dates.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::media;
use super::model::{
    first_non_empty, normalize_tags, parse_size, title_from_content, Enclosure, EnclosureSet,
    Entry, Feed,
};
use super::xml::{ns, Element};
use super::{IntoFeed, ParseError};
use crate::date::parse_or_now;
use crate::util::{absolute_url, escape_html, hash, is_absolute_http_url, strip_tags};

/// Which Atom revision a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Revision {
    V03,
    V10,
}

/// An Atom document ready to be transformed.
#[derive(Debug)]
pub struct AtomFeed {
    root: Element,
    revision: Revision,
}

impl AtomFeed {
    pub fn from_element(root: Element, legacy: bool) -> Result<Self, ParseError> {
        if root.name != "feed" {
            return Err(ParseError::UnexpectedRoot(root.name));
        }
        let revision = if legacy || root.ns == ns::ATOM03 {
            Revision::V03
        } else {
            Revision::V10
        };
        Ok(Self { root, revision })
    }

    fn is_atom(ns: &str) -> bool {
        ns == ns::ATOM || ns == ns::ATOM03 || ns.is_empty()
    }

    fn child<'a>(e: &'a Element, name: &str) -> Option<&'a Element> {
        e.child_where(name, Self::is_atom)
    }

    fn children<'a>(e: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
        e.elements().filter(move |c| c.name == name && Self::is_atom(&c.ns))
    }

    fn child_text(e: &Element, name: &str) -> Option<String> {
        Self::child(e, name).map(Element::text).filter(|t| !t.is_empty())
    }

    fn transform_entry(&self, e: &Element, feed: &Feed, feed_author: &str) -> Entry {
        let links = Links::from(e);
        let link = links
            .alternate()
            .map(|href| absolute_url(&feed.site_url, href))
            .filter(|u| !u.is_empty());
        let url = link.clone().unwrap_or_else(|| feed.site_url.clone());

        let content = match self.revision {
            Revision::V10 => first_non_empty([
                Self::child(e, "content").map(text_construct_html),
                Self::child(e, "summary").map(text_construct_html),
                media::description(e),
            ]),
            Revision::V03 => first_non_empty([
                Self::child(e, "content").map(legacy_content_html),
                Self::child(e, "summary").map(legacy_content_html),
            ]),
        }
        .unwrap_or_default();

        let date_fields: &[&str] = match self.revision {
            Revision::V10 => &["published", "updated"],
            Revision::V03 => &["issued", "modified", "created"],
        };
        let raw_date = date_fields.iter().find_map(|name| Self::child_text(e, name));
        let date = parse_or_now(raw_date.as_deref());

        let author = first_non_empty([Some(person_names(e)), Some(feed_author.to_owned())]).unwrap_or_default();

        let title = first_non_empty([
            Self::child(e, "title").map(|t| match self.revision {
                Revision::V10 => text_construct_plain(t),
                Revision::V03 => strip_tags(&legacy_content_html(t)),
            }),
            title_from_content(&content),
        ])
        .unwrap_or_else(|| url.clone());

        let id = Self::child_text(e, "id");
        let hash = match first_non_empty([id.as_deref(), link.as_deref()]) {
            Some(identity) => hash(&identity),
            None => hash(&format!("{title}{content}")),
        };

        let comments_url = links
            .find(|l| l.rel == "replies" && l.mime_type == "text/html")
            .map(|l| absolute_url(&feed.site_url, &l.href))
            .filter(|u| is_absolute_http_url(u))
            .unwrap_or_default();

        let mut enclosures = EnclosureSet::default();
        for enclosure in media::thumbnails(e, &feed.site_url) {
            enclosures.push(enclosure);
        }
        for link in links.0.iter().filter(|l| l.rel == "enclosure") {
            enclosures.push(Enclosure::new(
                absolute_url(&feed.site_url, &link.href),
                link.mime_type.clone(),
                link.length,
            ));
        }
        for enclosure in media::contents(e, &feed.site_url) {
            enclosures.push(enclosure);
        }
        for enclosure in media::peer_links(e, &feed.site_url) {
            enclosures.push(enclosure);
        }

        let tags = normalize_tags(Self::children(e, "category").filter_map(|c| {
            c.attr("term")
                .filter(|t| !t.trim().is_empty())
                .or_else(|| c.attr("label"))
                .map(str::to_owned)
        }));

        Entry {
            title,
            url,
            comments_url,
            author,
            content,
            date,
            hash,
            enclosures: enclosures.into_vec(),
            tags,
        }
    }
}

impl IntoFeed for AtomFeed {
    fn into_feed(self, base_url: &str) -> Feed {
        let root = &self.root;
        let links = Links::from(root);

        let feed_url = links
            .find(|l| l.rel == "self")
            .map(|l| absolute_url(base_url, &l.href))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| base_url.to_owned());

        let site_url = links
            .alternate()
            .map(|href| absolute_url(base_url, href))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| feed_url.clone());

        let title = Self::child(root, "title")
            .map(|t| match self.revision {
                Revision::V10 => text_construct_plain(t),
                Revision::V03 => strip_tags(&legacy_content_html(t)),
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| site_url.clone());

        let icon_url = first_non_empty([Self::child_text(root, "icon"), Self::child_text(root, "logo")])
            .map(|icon| absolute_url(&site_url, &icon));

        let mut feed = Feed {
            title,
            site_url,
            feed_url,
            icon_url,
            ttl_minutes: None,
            entries: Vec::new(),
        };

        let feed_author = person_names(root);
        let entries: Vec<Entry> = Self::children(root, "entry")
            .map(|e| self.transform_entry(e, &feed, &feed_author))
            .collect();
        feed.entries = entries;
        feed
    }
}

// ============================================================================
// Links
// ============================================================================

#[derive(Debug)]
struct Link {
    href: String,
    rel: String,
    mime_type: String,
    length: u64,
}

#[derive(Debug)]
struct Links(Vec<Link>);

impl From<&Element> for Links {
    fn from(e: &Element) -> Self {
        Links(
            AtomFeed::children(e, "link")
                .filter_map(|l| {
                    let href = l.attr("href").map(str::trim).filter(|h| !h.is_empty())?;
                    Some(Link {
                        href: href.to_owned(),
                        rel: l.attr("rel").unwrap_or_default().trim().to_ascii_lowercase(),
                        mime_type: l.attr("type").unwrap_or_default().trim().to_owned(),
                        length: parse_size(l.attr("length")),
                    })
                })
                .collect(),
        )
    }
}

impl Links {
    fn find(&self, predicate: impl Fn(&Link) -> bool) -> Option<&Link> {
        self.0.iter().find(|l| predicate(*l))
    }

    /// The human-facing link: `rel="alternate"`, or no rel with an HTML or
    /// absent type.
    fn alternate(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|l| {
                l.rel == "alternate"
                    || (l.rel.is_empty() && (l.mime_type.is_empty() || l.mime_type == "text/html"))
            })
            .map(|l| l.href.as_str())
    }
}

// ============================================================================
// Text constructs and persons
// ============================================================================

fn construct_type(e: &Element) -> String {
    e.attr("type").unwrap_or("text").trim().to_ascii_lowercase()
}

fn xhtml_body(e: &Element) -> String {
    let mut elements = e.elements();
    match (elements.next(), elements.next()) {
        (Some(div), None) if div.name == "div" => div.inner_xml(),
        _ => e.inner_xml(),
    }
}

/// Atom 1.0 text construct rendered as HTML.
fn text_construct_html(e: &Element) -> String {
    match construct_type(e).as_str() {
        "xhtml" | "application/xhtml+xml" => xhtml_body(e),
        "html" | "text/html" => e.text(),
        _ => escape_html(&e.text()).into_owned(),
    }
}

/// Atom 1.0 text construct rendered as plain text.
fn text_construct_plain(e: &Element) -> String {
    match construct_type(e).as_str() {
        "xhtml" | "application/xhtml+xml" => strip_tags(&xhtml_body(e)),
        "html" | "text/html" => strip_tags(&e.text()),
        _ => e.text().split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Atom 0.3 content: `mode` says how the payload is encoded, `type` is a MIME type.
fn legacy_content_html(e: &Element) -> String {
    let mime = e.attr("type").unwrap_or("text/plain").trim().to_ascii_lowercase();
    let is_markup = mime.contains("html") || mime.contains("xml");

    let payload = match e.attr("mode").unwrap_or("xml").trim() {
        "escaped" => e.text(),
        "base64" => match BASE64.decode(e.text().split_whitespace().collect::<String>()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::warn!(error = %err, "Invalid base64 Atom 0.3 content");
                String::new()
            }
        },
        _ if e.elements().next().is_some() => return xhtml_body(e),
        _ => e.text(),
    };

    if is_markup {
        payload.trim().to_owned()
    } else {
        escape_html(payload.trim()).into_owned()
    }
}

/// Comma-separated author names, with the email standing in for a missing name.
fn person_names(e: &Element) -> String {
    let names: Vec<String> = AtomFeed::children(e, "author")
        .filter_map(|author| {
            first_non_empty([AtomFeed::child_text(author, "name"), AtomFeed::child_text(author, "email")])
        })
        .collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://example.org/feed.atom";

    #[test]
    fn test_minimal_atom_entry() {
        let data = r#"<?xml version="1.0" encoding="utf-8"?>
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

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.title, "Example Feed");
        assert_eq!(feed.feed_url, BASE);
        assert_eq!(feed.site_url, "http://example.org/");

        let entry = &feed.entries[0];
        assert_eq!(entry.url, "http://example.org/2003/12/13/atom03");
        assert_eq!(entry.date.to_rfc3339(), "2003-12-13T18:30:02+00:00");
        assert_eq!(entry.author, "John Doe");
        assert_eq!(entry.content, "Some text.");
        assert_eq!(entry.hash, hash("urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a"));
        assert_eq!(parse_feed(BASE, data).unwrap().entries[0].hash, entry.hash);
    }

    #[test]
    fn test_self_link_and_relative_urls() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <link rel="self" href="/atom.xml"/>
  <link rel="alternate" type="text/html" href="/blog/"/>
  <icon>/favicon.ico</icon>
  <entry><link href="posts/1"/><title type="html">&lt;b&gt;Bold&lt;/b&gt; move</title></entry>
</feed>"#;

        let feed = parse_feed("https://example.org/somewhere", data).unwrap();
        assert_eq!(feed.feed_url, "https://example.org/atom.xml");
        assert_eq!(feed.site_url, "https://example.org/blog/");
        assert_eq!(feed.title, "https://example.org/blog/");
        assert_eq!(feed.icon_url.as_deref(), Some("https://example.org/favicon.ico"));
        assert_eq!(feed.entries[0].url, "https://example.org/blog/posts/1");
        assert_eq!(feed.entries[0].title, "Bold move");
    }

    #[test]
    fn test_alternate_link_resolves_against_fetch_url() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Mirrored</title>
  <link rel="self" href="https://feeds.feedburner.com/example"/>
  <link rel="alternate" href="/"/>
</feed>"#;

        let feed = parse_feed("https://example.org/atom.xml", data).unwrap();
        assert_eq!(feed.feed_url, "https://feeds.feedburner.com/example");
        assert_eq!(feed.site_url, "https://example.org/");
    }

    #[test]
    fn test_text_construct_types() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><id>1</id><content type="text">a &lt;b&gt; c</content></entry>
  <entry><id>2</id><content type="html"><![CDATA[<p>a &amp; b</p>]]></content></entry>
  <entry><id>3</id><content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hi <em>there</em></p></div></content></entry>
</feed>"#;

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.entries[0].content, "a &lt;b&gt; c");
        assert_eq!(feed.entries[1].content, "<p>a &amp; b</p>");
        assert_eq!(feed.entries[2].content, "<p>Hi <em>there</em></p>");
    }

    #[test]
    fn test_title_falls_back_to_content_then_url() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><link href="https://example.org/a"/><summary>Summary text here</summary></entry>
  <entry><link href="https://example.org/b"/></entry>
</feed>"#;

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.entries[0].title, "Summary text here");
        assert_eq!(feed.entries[1].title, "https://example.org/b");
        assert_eq!(feed.entries[1].hash, hash("https://example.org/b"));
    }

    #[test]
    fn test_enclosures_comments_and_tags() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <entry>
    <id>e</id>
    <link rel="enclosure" type="audio/mpeg" length="1337" href="https://cdn.example.org/ep.mp3"/>
    <link rel="enclosure" type="audio/mpeg" length="1" href="https://cdn.example.org/ep.mp3"/>
    <link rel="replies" type="text/html" href="https://example.org/e#comments"/>
    <media:thumbnail url="https://cdn.example.org/t.jpg"/>
    <category term="rust"/><category term="rust"/><category label="Go"/>
  </entry>
</feed>"#;

        let entry = parse_feed(BASE, data).unwrap().entries.remove(0);
        assert_eq!(
            entry.enclosures,
            vec![
                Enclosure::new("https://cdn.example.org/t.jpg", "image/*", 0),
                Enclosure::new("https://cdn.example.org/ep.mp3", "audio/mpeg", 1337),
            ]
        );
        assert_eq!(entry.comments_url, "https://example.org/e#comments");
        assert_eq!(entry.tags, vec!["rust", "Go"]);
    }

    #[test]
    fn test_entry_author_overrides_feed_author() {
        let data = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <author><name>Feed Author</name></author>
  <entry><id>1</id><author><email>jane@example.org</email></author></entry>
  <entry><id>2</id></entry>
</feed>"#;

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.entries[0].author, "jane@example.org");
        assert_eq!(feed.entries[1].author, "Feed Author");
    }

    #[test]
    fn test_atom03_feed() {
        let data = r#"<?xml version="1.0" encoding="utf-8"?>
<feed version="0.3" xmlns="http://purl.org/atom/ns#">
  <title>dive into mark</title>
  <link rel="alternate" type="text/html" href="http://diveintomark.org/"/>
  <modified>2003-12-13T18:30:02Z</modified>
  <entry>
    <title>Atom 0.3 snapshot</title>
    <link rel="alternate" type="text/html" href="http://diveintomark.org/2003/12/13/atom03"/>
    <id>tag:diveintomark.org,2003:3.2397</id>
    <issued>2003-12-13T08:29:29-04:00</issued>
    <modified>2003-12-13T18:30:02Z</modified>
    <content type="text/html" mode="escaped">&lt;p&gt;Escaped&lt;/p&gt;</content>
  </entry>
  <entry>
    <id>b64</id>
    <content type="text/html" mode="base64">PHA+QmFzZTY0PC9wPg==</content>
  </entry>
</feed>"#;

        let feed = parse_feed(BASE, data).unwrap();
        assert_eq!(feed.title, "dive into mark");
        assert_eq!(feed.site_url, "http://diveintomark.org/");

        let first = &feed.entries[0];
        assert_eq!(first.date.to_rfc3339(), "2003-12-13T12:29:29+00:00");
        assert_eq!(first.content, "<p>Escaped</p>");
        assert_eq!(feed.entries[1].content, "<p>Base64</p>");
        assert_eq!(feed.entries[1].title, "Base64");
    }
}
