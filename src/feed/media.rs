//! Media RSS (`media:` namespace) extraction shared by Atom and RSS items.
//!
//! Elements are looked up both directly on the item and inside any
//! `media:group` children.

use super::model::{parse_size, Enclosure};
use super::xml::{ns, Element};
use crate::util::{absolute_url, escape_html};

/// Media elements named `name` on `item` and in its groups, in document order.
fn media_elements<'a>(item: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    item.elements().flat_map(move |child| {
        let direct = child.is(ns::MEDIA, name).then_some(child);
        let grouped = child
            .is(ns::MEDIA, "group")
            .then(|| child.children(ns::MEDIA, name))
            .into_iter()
            .flatten();
        direct.into_iter().chain(grouped)
    })
}

pub(crate) fn thumbnails(item: &Element, base: &str) -> Vec<Enclosure> {
    media_elements(item, "thumbnail")
        .filter_map(|e| e.attr("url"))
        .map(|url| Enclosure::new(absolute_url(base, url.trim()), "image/*", 0))
        .collect()
}

pub(crate) fn contents(item: &Element, base: &str) -> Vec<Enclosure> {
    media_elements(item, "content")
        .filter_map(|e| {
            let url = e.attr("url")?;
            Some(Enclosure::new(
                absolute_url(base, url.trim()),
                content_mime_type(e),
                parse_size(e.attr("fileSize")),
            ))
        })
        .collect()
}

pub(crate) fn peer_links(item: &Element, base: &str) -> Vec<Enclosure> {
    media_elements(item, "peerLink")
        .filter_map(|e| {
            let href = e.attr("href")?;
            let mime = e
                .attr("type")
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("application/octet-stream");
            Some(Enclosure::new(absolute_url(base, href.trim()), mime.trim(), 0))
        })
        .collect()
}

/// First non-empty `media:description` as HTML.
pub(crate) fn description(item: &Element) -> Option<String> {
    media_elements(item, "description").find_map(|e| {
        let text = e.text();
        if text.is_empty() {
            return None;
        }
        if e.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("html")) {
            Some(text)
        } else {
            Some(escape_html(&text).replace('\n', "<br>"))
        }
    })
}

/// First non-empty `media:title`.
pub(crate) fn title(item: &Element) -> Option<String> {
    media_elements(item, "title")
        .map(Element::text)
        .find(|t| !t.is_empty())
}

fn content_mime_type(e: &Element) -> String {
    if let Some(mime) = e.attr("type").map(str::trim).filter(|t| !t.is_empty()) {
        return mime.to_owned();
    }
    match e.attr("medium").map(str::trim) {
        Some("image") => "image/*",
        Some("video") => "video/*",
        Some("audio") => "audio/*",
        _ => "application/octet-stream",
    }
    .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml;
    use pretty_assertions::assert_eq;

    const ITEM: &str = r#"<item xmlns:media="http://search.yahoo.com/mrss/">
        <media:thumbnail url="/thumb.jpg"/>
        <media:group>
            <media:content url="https://cdn.example.org/v.mp4" medium="video" fileSize="42"/>
            <media:content url="https://cdn.example.org/a.mp3" type="audio/mpeg" fileSize="oops"/>
            <media:description>line one
line &lt;two&gt;</media:description>
        </media:group>
        <media:peerLink href="magnet:?xt=urn:btih:abc"/>
        <media:title>Clip</media:title>
    </item>"#;

    #[test]
    fn test_media_extraction() {
        let item = xml::parse(ITEM).unwrap();
        let base = "https://example.org/";

        assert_eq!(
            thumbnails(&item, base),
            vec![Enclosure::new("https://example.org/thumb.jpg", "image/*", 0)]
        );
        assert_eq!(
            contents(&item, base),
            vec![
                Enclosure::new("https://cdn.example.org/v.mp4", "video/*", 42),
                Enclosure::new("https://cdn.example.org/a.mp3", "audio/mpeg", 0),
            ]
        );
        assert_eq!(peer_links(&item, base).len(), 1);
        assert_eq!(peer_links(&item, base)[0].mime_type, "application/octet-stream");
        assert_eq!(description(&item).as_deref(), Some("line one<br>line &lt;two&gt;"));
        assert_eq!(title(&item).as_deref(), Some("Clip"));
    }
}
