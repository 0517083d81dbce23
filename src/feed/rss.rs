//! RSS 0.9x/2.0 with the Dublin Core, content, Media RSS, iTunes, Google Play,
//! FeedBurner and Atom extensions.

use url::Url;

use super::media;
use super::model::{
    first_non_empty, normalize_tags, parse_size, title_from_content, Enclosure, EnclosureSet,
    Entry, Feed,
};
use super::xml::{ns, Element};
use super::{IntoFeed, ParseError};
use crate::date::parse_or_now;
use crate::util::{absolute_url, collapse_whitespace, hash, is_absolute_http_url, strip_tags};

/// Namespaces that never hold core RSS elements.
static EXTENSION_NAMESPACES: &[&str] = &[
    ns::ATOM,
    ns::DC,
    ns::CONTENT,
    ns::MEDIA,
    ns::ITUNES,
    ns::GOOGLEPLAY,
    ns::FEEDBURNER,
    ns::RDF,
];

fn is_core(namespace: &str) -> bool {
    namespace.is_empty() || !EXTENSION_NAMESPACES.contains(&namespace)
}

fn core<'a>(e: &'a Element, name: &str) -> Option<&'a Element> {
    e.child_where(name, is_core)
}

fn core_text(e: &Element, name: &str) -> Option<String> {
    core(e, name).map(Element::text).filter(|t| !t.is_empty())
}

fn core_children<'a>(e: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    e.elements().filter(move |c| c.name == name && is_core(&c.ns))
}

/// Plain-text rendering for titles and author names, which sometimes carry markup.
fn plain(value: &str) -> String {
    if value.contains('<') {
        strip_tags(value)
    } else {
        collapse_whitespace(value)
    }
}

/// An RSS document ready to be transformed.
#[derive(Debug)]
pub struct RssFeed {
    root: Element,
}

impl RssFeed {
    pub fn from_element(root: Element) -> Result<Self, ParseError> {
        if root.name != "rss" {
            return Err(ParseError::UnexpectedRoot(root.name));
        }
        Ok(Self { root })
    }

    fn channel(&self) -> &Element {
        core(&self.root, "channel").unwrap_or(&self.root)
    }

    fn items(&self) -> impl Iterator<Item = &Element> {
        let channel = self.channel();
        let stray = (!std::ptr::eq(channel, &self.root)).then(|| core_children(&self.root, "item"));
        core_children(channel, "item").chain(stray.into_iter().flatten())
    }

    fn feed_author(channel: &Element) -> String {
        first_non_empty([
            channel.child_text(ns::ITUNES, "author"),
            channel.child_text(ns::GOOGLEPLAY, "author"),
            core_text(channel, "managingEditor"),
            core_text(channel, "webMaster"),
        ])
        .map(|author| plain(&author))
        .unwrap_or_default()
    }

    fn transform_item(item: &Element, feed: &Feed, feed_author: &str) -> Entry {
        let link = item_link(item)
            .map(|href| absolute_url(&feed.site_url, &href))
            .filter(|u| !u.is_empty());
        let url = link.clone().unwrap_or_else(|| feed.site_url.clone());

        let content = first_non_empty([
            item.child_text(ns::CONTENT, "encoded"),
            core_text(item, "description"),
            media::description(item),
        ])
        .unwrap_or_default();

        let raw_date = first_non_empty([core_text(item, "pubDate"), item.child_text(ns::DC, "date")]);
        let date = parse_or_now(raw_date.as_deref());

        let author = first_non_empty([
            item.child_text(ns::ITUNES, "author"),
            item.child_text(ns::GOOGLEPLAY, "author"),
            item.child_text(ns::DC, "creator"),
            core_text(item, "author"),
            item.child(ns::ATOM, "author").and_then(|a| {
                first_non_empty([a.child_text(ns::ATOM, "name"), a.child_text(ns::ATOM, "email")])
            }),
        ])
        .map(|author| plain(&author))
        .filter(|author| !author.is_empty())
        .unwrap_or_else(|| feed_author.to_owned());

        let title = first_non_empty([
            core_text(item, "title").map(|t| plain(&t)),
            media::title(item).map(|t| plain(&t)),
            title_from_content(&content),
        ])
        .unwrap_or_else(|| url.clone());

        let guid = core_text(item, "guid");
        let hash = match first_non_empty([guid.as_deref(), link.as_deref()]) {
            Some(identity) => hash(&identity),
            None => hash(&format!(
                "{}{}",
                core_text(item, "title").unwrap_or_default(),
                core_text(item, "description").unwrap_or_default()
            )),
        };

        let comments_url = core_text(item, "comments")
            .map(|c| absolute_url(&feed.site_url, &c))
            .filter(|c| is_absolute_http_url(c))
            .unwrap_or_default();

        let tags = normalize_tags(
            core_children(item, "category")
                .chain(item.children(ns::DC, "subject"))
                .map(Element::text),
        );

        Entry {
            title,
            url,
            comments_url,
            author,
            content,
            date,
            hash,
            enclosures: item_enclosures(item, &feed.site_url),
            tags,
        }
    }
}

impl IntoFeed for RssFeed {
    fn into_feed(self, base_url: &str) -> Feed {
        let channel = self.channel();

        let feed_url = channel
            .children(ns::ATOM, "link")
            .find(|l| l.attr("rel").is_some_and(|r| r.trim().eq_ignore_ascii_case("self")))
            .and_then(|l| l.attr("href"))
            .map(|href| absolute_url(base_url, href.trim()))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| base_url.to_owned());

        let site_url = core_text(channel, "link")
            .map(|link| absolute_url(base_url, &link))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| feed_url.clone());

        let title = core_text(channel, "title")
            .map(|t| plain(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| site_url.clone());

        let icon_url = first_non_empty([
            core(channel, "image").and_then(|image| core_text(image, "url")),
            channel
                .child(ns::ITUNES, "image")
                .and_then(|i| i.attr("href"))
                .map(str::to_owned),
            channel
                .child(ns::GOOGLEPLAY, "image")
                .and_then(|i| i.attr("href"))
                .map(str::to_owned),
        ])
        .map(|icon| absolute_url(&site_url, &icon));

        let ttl_minutes = core_text(channel, "ttl").and_then(|ttl| ttl.parse().ok());

        let mut feed = Feed {
            title,
            site_url,
            feed_url,
            icon_url,
            ttl_minutes,
            entries: Vec::new(),
        };

        let feed_author = Self::feed_author(channel);
        let entries: Vec<Entry> = self
            .items()
            .map(|item| Self::transform_item(item, &feed, &feed_author))
            .collect();
        feed.entries = entries;
        feed
    }
}

/// Entry link in precedence order: FeedBurner original link, `<link>`,
/// an alternate `atom:link`, then a permalink `<guid>`.
fn item_link(item: &Element) -> Option<String> {
    let atom_link = || {
        item.children(ns::ATOM, "link")
            .find(|l| {
                l.attr("rel")
                    .map(str::trim)
                    .map_or(true, |rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
            })
            .and_then(|l| l.attr("href"))
            .map(str::to_owned)
    };

    let permalink = || {
        let guid = core(item, "guid")?;
        if guid
            .attr("isPermaLink")
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("false"))
        {
            return None;
        }
        Some(guid.text()).filter(|g| is_absolute_http_url(g))
    };

    first_non_empty([item.child_text(ns::FEEDBURNER, "origLink"), core_text(item, "link")])
        .or_else(|| first_non_empty([atom_link()]))
        .or_else(permalink)
}

/// Thumbnails, then `<enclosure>` elements, then Media RSS contents and peer links.
fn item_enclosures(item: &Element, base: &str) -> Vec<Enclosure> {
    let mut set = EnclosureSet::default();

    for thumbnail in media::thumbnails(item, base) {
        set.push(thumbnail);
    }

    let original = item.child_text(ns::FEEDBURNER, "origEnclosureLink");
    for enclosure in core_children(item, "enclosure") {
        let Some(url) = enclosure.attr("url").map(str::trim).filter(|u| !u.is_empty()) else {
            continue;
        };
        let mut url = absolute_url(base, url);
        if let Some(original) = original.as_deref() {
            if file_name(original).is_some() && file_name(original) == file_name(&url) {
                url = original.to_owned();
            }
        }
        set.push(Enclosure::new(
            url,
            enclosure.attr("type").unwrap_or_default().trim(),
            parse_size(enclosure.attr("length")),
        ));
    }

    for content in media::contents(item, base) {
        set.push(content);
    }
    for peer in media::peer_links(item, base) {
        set.push(peer);
    }

    set.into_vec()
}

fn file_name(value: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://example.org/rss.xml";

    fn parse(data: &str) -> Feed {
        parse_feed(BASE, data).unwrap()
    }

    #[test]
    fn test_channel_fields() {
        let feed = parse(
            r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
  <title>Example &amp; Co</title>
  <link>https://example.org/</link>
  <atom:link rel="self" href="https://feeds.example.org/main"/>
  <image><url>/logo.png</url></image>
  <ttl>60</ttl>
</channel></rss>"#,
        );

        assert_eq!(feed.title, "Example & Co");
        assert_eq!(feed.site_url, "https://example.org/");
        assert_eq!(feed.feed_url, "https://feeds.example.org/main");
        assert_eq!(feed.icon_url.as_deref(), Some("https://example.org/logo.png"));
        assert_eq!(feed.ttl_minutes, Some(60));
    }

    #[test]
    fn test_relative_link_resolves_against_fetch_url() {
        let feed = parse(
            r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
  <title>Mirrored</title>
  <link>/</link>
  <atom:link rel="self" href="https://feeds.feedburner.com/example"/>
</channel></rss>"#,
        );

        assert_eq!(feed.feed_url, "https://feeds.feedburner.com/example");
        assert_eq!(feed.site_url, "https://example.org/");
    }

    #[test]
    fn test_missing_title_falls_back_to_site_url() {
        let feed = parse("<rss><channel><link>https://example.org/</link></channel></rss>");
        assert_eq!(feed.title, "https://example.org/");
        assert_eq!(feed.feed_url, BASE);
    }

    #[test]
    fn test_item_basics() {
        let feed = parse(
            r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <link>https://example.org/</link>
  <item>
    <title>First</title>
    <link>/posts/1</link>
    <guid isPermaLink="false">post-1</guid>
    <pubDate>Tue, 10 Jun 2003 04:00:00 GMT</pubDate>
    <description>&lt;p&gt;Body&lt;/p&gt;</description>
    <comments>https://example.org/posts/1#comments</comments>
    <dc:creator>&lt;b&gt;Ann&lt;/b&gt;</dc:creator>
    <category>news</category>
    <dc:subject>news</dc:subject>
    <dc:subject>tech</dc:subject>
  </item>
</channel></rss>"#,
        );

        let entry = &feed.entries[0];
        assert_eq!(entry.title, "First");
        assert_eq!(entry.url, "https://example.org/posts/1");
        assert_eq!(entry.hash, hash("post-1"));
        assert_eq!(entry.date.to_rfc3339(), "2003-06-10T04:00:00+00:00");
        assert_eq!(entry.content, "<p>Body</p>");
        assert_eq!(entry.comments_url, "https://example.org/posts/1#comments");
        assert_eq!(entry.author, "Ann");
        assert_eq!(entry.tags, vec!["news", "tech"]);
    }

    #[test]
    fn test_empty_enclosure_is_dropped() {
        let feed = parse(
            r#"<rss><channel><item><title>x</title><enclosure url="" length="0"/></item></channel></rss>"#,
        );
        assert!(feed.entries[0].enclosures.is_empty());
    }

    #[test]
    fn test_enclosure_precedence_and_feedburner() {
        let feed = parse(
            r#"<rss xmlns:media="http://search.yahoo.com/mrss/" xmlns:feedburner="http://rssnamespace.org/feedburner/ext/1.0"><channel>
  <item>
    <feedburner:origLink>https://example.org/real</feedburner:origLink>
    <link>https://feedproxy.google.com/~r/x</link>
    <feedburner:origEnclosureLink>https://cdn.example.org/show/ep1.mp3</feedburner:origEnclosureLink>
    <media:thumbnail url="https://cdn.example.org/ep1.jpg"/>
    <enclosure url="https://feedproxy.google.com/~r/x/ep1.mp3" type="audio/mpeg" length="x"/>
    <media:content url="https://cdn.example.org/show/ep1.mp3" type="audio/mpeg" fileSize="99"/>
    <media:content url="https://cdn.example.org/ep1.ogg" type="audio/ogg"/>
  </item>
</channel></rss>"#,
        );

        let entry = &feed.entries[0];
        assert_eq!(entry.url, "https://example.org/real");
        assert_eq!(
            entry.enclosures,
            vec![
                Enclosure::new("https://cdn.example.org/ep1.jpg", "image/*", 0),
                Enclosure::new("https://cdn.example.org/show/ep1.mp3", "audio/mpeg", 0),
                Enclosure::new("https://cdn.example.org/ep1.ogg", "audio/ogg", 0),
            ]
        );
    }

    #[test]
    fn test_link_fallbacks() {
        let feed = parse(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel><link>https://example.org/</link>
  <item><title>a</title><atom:link href="https://example.org/a"/></item>
  <item><title>b</title><guid>https://example.org/b</guid></item>
  <item><title>c</title><guid isPermaLink="false">https://example.org/c</guid></item>
</channel></rss>"#,
        );

        assert_eq!(feed.entries[0].url, "https://example.org/a");
        assert_eq!(feed.entries[1].url, "https://example.org/b");
        assert_eq!(feed.entries[2].url, "https://example.org/");
        assert_eq!(feed.entries[2].hash, hash("https://example.org/c"));
    }

    #[test]
    fn test_author_fallback_chain() {
        let feed = parse(
            r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
  <itunes:author>Podcast Host</itunes:author>
  <managingEditor>editor@example.org</managingEditor>
  <item><title>a</title><itunes:author>Guest</itunes:author><author>x@example.org</author></item>
  <item><title>b</title></item>
</channel></rss>"#,
        );

        assert_eq!(feed.entries[0].author, "Guest");
        assert_eq!(feed.entries[1].author, "Podcast Host");
    }

    #[test]
    fn test_title_and_date_fallbacks() {
        let feed = parse(
            r#"<rss xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <item><link>https://example.org/1</link><description>Only a description</description><dc:date>2020-05-01T10:00:00+02:00</dc:date></item>
  <item><link>https://example.org/2</link></item>
</channel></rss>"#,
        );

        assert_eq!(feed.entries[0].title, "Only a description");
        assert_eq!(feed.entries[0].date.to_rfc3339(), "2020-05-01T08:00:00+00:00");
        assert_eq!(feed.entries[1].title, "https://example.org/2");
    }

    #[test]
    fn test_hash_without_guid_or_link() {
        let feed = parse("<rss><channel><item><title>T</title><description>D</description></item></channel></rss>");
        assert_eq!(feed.entries[0].hash, hash("TD"));
    }
}
