//! Whitelist-based HTML sanitizer for entry content.
//!
//! The input is parsed as an HTML fragment and re-serialized. Elements
//! outside the whitelist are unwrapped (their text survives), `script`,
//! `style` and `noscript` are removed with their content, and every URL is
//! absolutized against the entry's base URL and checked against the scheme
//! whitelist and the tracker blacklist. Sanitization never fails.
//!
//! # Example
//!
//! ```
//! use feedwright::sanitizer::sanitize;
//!
//! let html = sanitize(
//!     "https://example.org/post/",
//!     r#"<p onclick="x()">Hi <script>alert(1)</script><img src="cat.png"></p>"#,
//! );
//! assert_eq!(
//!     html,
//!     r#"<p>Hi <img src="https://example.org/post/cat.png" loading="lazy"></p>"#
//! );
//! ```

mod policy;
mod srcset;

use ego_tree::NodeRef;
use scraper::{node::Element, Html, Node};
use url::Url;

use crate::proxy::ImageProxy;
use crate::util::{absolute_url, escape_html};

pub use srcset::{parse_srcset, ImageCandidate, ImageCandidates};

/// Sanitizes `html` with URLs resolved against `base_url`.
pub fn sanitize(base_url: &str, html: &str) -> String {
    Sanitizer::new(base_url).sanitize(html)
}

/// Sanitizer settings for one document.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'a> {
    base_url: &'a str,
    image_proxy: Option<&'a ImageProxy>,
}

enum Step<'a> {
    Enter(NodeRef<'a, Node>),
    Close(&'a str),
}

impl<'a> Sanitizer<'a> {
    pub fn new(base_url: &'a str) -> Self {
        Self {
            base_url,
            image_proxy: None,
        }
    }

    /// Routes `img@src`, `img@srcset` and `picture > source@srcset` through
    /// `proxy` after filtering.
    pub fn with_image_proxy(mut self, proxy: &'a ImageProxy) -> Self {
        self.image_proxy = Some(proxy);
        self
    }

    pub fn sanitize(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());
        let mut stack = vec![Step::Enter(fragment.tree.root())];

        // Explicit stack: nesting depth is attacker-controlled.
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
                Step::Enter(node) => node,
            };

            match node.value() {
                Node::Text(text) => out.push_str(&escape_html(text)),
                Node::Element(element) => {
                    let tag = element.name();
                    if policy::BLOCKED_TAGS.contains(&tag) {
                        continue;
                    }
                    if let Some(start_tag) = self.start_tag(element, in_picture(node)) {
                        out.push_str(&start_tag);
                        if policy::VOID_TAGS.contains(&tag) {
                            continue;
                        }
                        stack.push(Step::Close(tag));
                    }
                    push_children(&mut stack, node);
                }
                Node::Document | Node::Fragment => push_children(&mut stack, node),
                _ => {}
            }
        }

        out
    }

    /// Serialized start tag, or `None` when the element must not be emitted.
    fn start_tag(&self, element: &Element, in_picture: bool) -> Option<String> {
        let tag = element.name();
        let allowed = policy::allowed_attributes(tag)?;

        if tag == "img" && is_pixel_tracker(element) {
            tracing::trace!("Dropping 1x1 tracking image");
            return None;
        }

        let kept: Vec<(&str, String)> = allowed
            .iter()
            .filter_map(|&name| {
                let value = element.attr(name)?;
                let value = self.attribute(tag, name, value, in_picture)?;
                Some((name, value))
            })
            .collect();

        let required = policy::required_attributes(tag);
        if !required.is_empty() && !kept.iter().any(|(name, _)| required.contains(name)) {
            tracing::trace!(tag, "Dropping element without a usable resource attribute");
            return None;
        }

        let mut out = String::with_capacity(32);
        out.push('<');
        out.push_str(tag);
        let injected = policy::injected_attributes(tag);
        let attributes = kept
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .chain(injected.iter().copied());
        for (name, value) in attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
        out.push('>');
        Some(out)
    }

    fn attribute(&self, tag: &str, name: &str, value: &str, in_picture: bool) -> Option<String> {
        let proxy = self.image_proxy.filter(|_| match (tag, name) {
            ("img", "src" | "srcset") => true,
            ("source", "srcset") => in_picture,
            _ => false,
        });

        if name == "srcset" {
            let candidates: ImageCandidates = parse_srcset(value)
                .into_iter()
                .filter_map(|candidate| {
                    let image_url = self.url(&candidate.image_url)?;
                    Some(ImageCandidate {
                        image_url,
                        ..candidate
                    })
                })
                .collect();
            let candidates = match proxy {
                Some(proxy) => proxy.rewrite_srcset(candidates),
                None => candidates,
            };
            return (!candidates.is_empty()).then(|| candidates.to_string());
        }

        if !policy::URL_ATTRIBUTES.contains(&name) {
            return Some(value.to_owned());
        }

        let url = self.url(value)?;
        if tag == "iframe" {
            return iframe_source(&url);
        }
        Some(proxy.and_then(|proxy| proxy.proxify(&url)).unwrap_or(url))
    }

    /// Absolute, whitelisted, non-tracking form of `value`.
    fn url(&self, value: &str) -> Option<String> {
        let url = absolute_url(self.base_url, value);
        if url.is_empty() || !policy::has_allowed_scheme(&url) {
            return None;
        }
        if policy::is_blocked_resource(&url) {
            tracing::trace!(url = %url, "Dropping blocked resource");
            return None;
        }
        Some(url)
    }
}

fn push_children<'a>(stack: &mut Vec<Step<'a>>, node: NodeRef<'a, Node>) {
    let start = stack.len();
    stack.extend(node.children().map(Step::Enter));
    stack[start..].reverse();
}

fn in_picture(node: NodeRef<'_, Node>) -> bool {
    node.parent()
        .and_then(|parent| parent.value().as_element().map(|e| e.name() == "picture"))
        .unwrap_or(false)
}

fn is_pixel_tracker(element: &Element) -> bool {
    let is_one = |name| element.attr(name).map(str::trim) == Some("1");
    is_one("width") && is_one("height")
}

/// Keeps embeds from whitelisted providers; YouTube moves to its
/// privacy-enhanced domain.
fn iframe_source(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    if !policy::is_allowed_iframe_host(&host) {
        tracing::trace!(host = %host, "Dropping iframe from non-whitelisted host");
        return None;
    }

    if matches!(host.as_str(), "youtube.com" | "www.youtube.com" | "m.youtube.com")
        && parsed.path().starts_with("/embed/")
    {
        parsed.set_scheme("https").ok()?;
        parsed.set_host(Some(policy::YOUTUBE_PRIVACY_HOST)).ok()?;
    }

    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ImageProxyMode;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use regex::Regex;

    const BASE: &str = "https://example.org/blog/post.html";

    #[test]
    fn test_keeps_whitelisted_markup() {
        assert_eq!(
            sanitize(BASE, "<p>Hello <b>World</b><br/>again</p>"),
            "<p>Hello <b>World</b><br>again</p>"
        );
    }

    #[test]
    fn test_drops_blocked_tags_with_content() {
        let html = "<p>a</p><script>alert(1)</script><style>p{}</style><noscript><p>b</p></noscript><p>c</p>";
        assert_eq!(sanitize(BASE, html), "<p>a</p><p>c</p>");
    }

    #[test]
    fn test_unknown_tags_keep_text() {
        assert_eq!(sanitize(BASE, "<custom-tag>text <font>here</font></custom-tag>"), "text here");
    }

    #[test]
    fn test_drops_comments_and_disallowed_attributes() {
        assert_eq!(
            sanitize(BASE, r#"<!-- hidden --><p class="x" style="color:red" onclick="evil()">ok</p>"#),
            "<p>ok</p>"
        );
    }

    #[test]
    fn test_links_are_absolutized_and_hardened() {
        assert_eq!(
            sanitize(BASE, r#"<a href="../about" title="About" target="_self">About</a>"#),
            r#"<a href="https://example.org/about" title="About" rel="noopener noreferrer" target="_blank" referrerpolicy="no-referrer">About</a>"#
        );
    }

    #[test]
    fn test_javascript_link_is_unwrapped() {
        assert_eq!(sanitize(BASE, r#"<a href="javascript:alert(1)">click</a>"#), "click");
    }

    #[test]
    fn test_tracker_image_removed() {
        assert_eq!(
            sanitize(BASE, r#"<p>x<img src="https://stats.wordpress.com/some-tracker"></p>"#),
            "<p>x</p>"
        );
    }

    #[test]
    fn test_pixel_tracker_removed() {
        assert_eq!(
            sanitize(BASE, r#"<img src="https://example.org/p.gif" width="1" height="1">"#),
            ""
        );
    }

    #[test]
    fn test_image_attributes() {
        assert_eq!(
            sanitize(BASE, r#"<img alt="A cat" src="/cat.png" width="200" data-foo="bar">"#),
            r#"<img alt="A cat" src="https://example.org/cat.png" width="200" loading="lazy">"#
        );
    }

    #[test]
    fn test_srcset_filtered_per_candidate() {
        let html = r#"<img src="a.png" srcset="a.png 1x, javascript:alert(1) 2x, //cdn.example.org/b.png 3x">"#;
        assert_eq!(
            sanitize(BASE, html),
            r#"<img src="https://example.org/blog/a.png" srcset="https://example.org/blog/a.png 1x, https://cdn.example.org/b.png 3x" loading="lazy">"#
        );
    }

    #[test]
    fn test_youtube_iframe_rewritten_and_sandboxed() {
        let html = r#"<iframe width="560" src="//www.youtube.com/embed/abc123?rel=0" onload="x()"></iframe>"#;
        assert_eq!(
            sanitize(BASE, html),
            r#"<iframe width="560" src="https://www.youtube-nocookie.com/embed/abc123?rel=0" sandbox="allow-scripts allow-same-origin allow-popups allow-popups-to-escape-sandbox" loading="lazy"></iframe>"#
        );
    }

    #[test]
    fn test_unknown_iframe_host_removed() {
        assert_eq!(sanitize(BASE, r#"<iframe src="https://evil.example.com/embed"></iframe>"#), "");
    }

    #[test]
    fn test_media_tags_get_controls() {
        assert_eq!(
            sanitize(BASE, r#"<video src="movie.mp4" poster="javascript:x"></video>"#),
            r#"<video src="https://example.org/blog/movie.mp4" controls="controls"></video>"#
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(sanitize(BASE, "a &lt;b&gt; &amp; c"), "a &lt;b&gt; &amp; c");
    }

    #[test]
    fn test_image_proxy_rewrites_http_images() {
        let proxy = ImageProxy::new(ImageProxyMode::All, "/proxy/{encodedURL}");
        let html = Sanitizer::new("http://website/")
            .with_image_proxy(&proxy)
            .sanitize(r#"<img src="http://website/folder/image.png">"#);
        assert_eq!(
            html,
            r#"<img src="/proxy/aHR0cDovL3dlYnNpdGUvZm9sZGVyL2ltYWdlLnBuZw==" loading="lazy">"#
        );
    }

    #[test]
    fn test_image_proxy_picture_sources_only() {
        let proxy = ImageProxy::new(ImageProxyMode::All, "/proxy/{encodedURL}");
        let sanitizer = Sanitizer::new("https://example.org/").with_image_proxy(&proxy);

        let in_picture = sanitizer.sanitize(r#"<picture><source srcset="https://example.org/a.webp"></picture>"#);
        assert!(in_picture.contains(r#"srcset="/proxy/"#), "{in_picture}");

        let in_video = sanitizer.sanitize(r#"<video><source src="https://example.org/a.mp4"></video>"#);
        assert!(in_video.contains(r#"src="https://example.org/a.mp4""#), "{in_video}");
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let html = "<div>".repeat(5_000) + "deep" + &"</div>".repeat(5_000);
        assert!(sanitize(BASE, &html).contains("deep"));
    }

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("<script>".to_owned()),
            Just("</script>".to_owned()),
            Just("<style>".to_owned()),
            Just("<noscript>".to_owned()),
            Just("<SCRIPT src=x>".to_owned()),
            Just(r#"<a href="javascript:alert(1)">"#.to_owned()),
            Just(r#"<img src="data:image/png;base64,AAAA">"#.to_owned()),
            Just(r#"<iframe src="vbscript:x">"#.to_owned()),
            Just(r#"<a href="/relative">"#.to_owned()),
            Just("<p>".to_owned()),
            Just("</p>".to_owned()),
            Just("<svg><script>x</script></svg>".to_owned()),
            "[a-z <>/=\"':&;]{0,12}",
            "<(a|img|video|source|iframe) (href|src|poster)=\"[a-z:/. ]{0,16}\">",
        ]
    }

    proptest! {
        #[test]
        fn prop_output_is_safe(parts in prop::collection::vec(fragment(), 0..24)) {
            let output = sanitize(BASE, &parts.concat());
            let lower = output.to_ascii_lowercase();

            prop_assert!(!lower.contains("<script"), "{}", output);
            prop_assert!(!lower.contains("<style"), "{}", output);
            prop_assert!(!lower.contains("<noscript"), "{}", output);

            let url_attr = Regex::new(r#"\s(?:href|src|poster|cite)="([^"]*)""#).unwrap();
            for caps in url_attr.captures_iter(&output) {
                let value = &caps[1];
                prop_assert!(policy::has_allowed_scheme(value), "{} in {}", value, output);
            }
        }
    }
}
