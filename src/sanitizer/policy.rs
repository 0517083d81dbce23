//! Read-only policy tables for the sanitizer.

/// Tags that may be emitted, each with the attributes it may keep.
/// Attributes are written in the order listed here.
const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "id"]),
    ("abbr", &["title"]),
    ("acronym", &["title"]),
    ("article", &[]),
    ("aside", &[]),
    ("audio", &["src"]),
    ("b", &[]),
    ("bdi", &[]),
    ("bdo", &["dir"]),
    ("blockquote", &["cite"]),
    ("br", &[]),
    ("caption", &[]),
    ("cite", &[]),
    ("code", &[]),
    ("col", &["span"]),
    ("colgroup", &["span"]),
    ("dd", &["id"]),
    ("del", &["cite", "datetime"]),
    ("details", &["open"]),
    ("dfn", &[]),
    ("div", &[]),
    ("dl", &["id"]),
    ("dt", &["id"]),
    ("em", &[]),
    ("figcaption", &[]),
    ("figure", &[]),
    ("h1", &["id"]),
    ("h2", &["id"]),
    ("h3", &["id"]),
    ("h4", &["id"]),
    ("h5", &["id"]),
    ("h6", &["id"]),
    ("hr", &[]),
    ("i", &[]),
    ("iframe", &["width", "height", "frameborder", "src", "allowfullscreen"]),
    ("img", &["alt", "title", "src", "srcset", "sizes", "width", "height"]),
    ("ins", &["cite", "datetime"]),
    ("kbd", &[]),
    ("li", &["id"]),
    ("mark", &[]),
    ("ol", &["id", "start", "reversed"]),
    ("p", &[]),
    ("picture", &[]),
    ("pre", &[]),
    ("q", &["cite"]),
    ("rp", &[]),
    ("rt", &[]),
    ("rtc", &[]),
    ("ruby", &[]),
    ("s", &[]),
    ("samp", &[]),
    ("section", &[]),
    ("small", &[]),
    ("source", &["src", "type", "srcset", "sizes", "media"]),
    ("span", &[]),
    ("strong", &[]),
    ("sub", &[]),
    ("summary", &[]),
    ("sup", &["id"]),
    ("table", &[]),
    ("tbody", &[]),
    ("td", &["rowspan", "colspan"]),
    ("tfoot", &[]),
    ("th", &["rowspan", "colspan"]),
    ("thead", &[]),
    ("time", &["datetime"]),
    ("tr", &[]),
    ("u", &[]),
    ("ul", &["id"]),
    ("var", &[]),
    ("video", &["poster", "height", "width", "src"]),
    ("wbr", &[]),
];

/// Tags dropped together with everything inside them, text included.
pub(super) const BLOCKED_TAGS: &[&str] = &["script", "style", "noscript"];

/// Tags that have no end tag.
pub(super) const VOID_TAGS: &[&str] = &["br", "col", "hr", "img", "source", "wbr"];

/// Tags only emitted when at least one of these attributes survives filtering.
const REQUIRED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("iframe", &["src"]),
    ("img", &["src"]),
    ("source", &["src", "srcset"]),
];

/// Attributes appended after filtering, replacing any author-supplied value.
const INJECTED_ATTRIBUTES: &[(&str, &[(&str, &str)])] = &[
    (
        "a",
        &[
            ("rel", "noopener noreferrer"),
            ("target", "_blank"),
            ("referrerpolicy", "no-referrer"),
        ],
    ),
    ("audio", &[("controls", "controls")]),
    (
        "iframe",
        &[
            (
                "sandbox",
                "allow-scripts allow-same-origin allow-popups allow-popups-to-escape-sandbox",
            ),
            ("loading", "lazy"),
        ],
    ),
    ("img", &[("loading", "lazy")]),
    ("video", &[("controls", "controls")]),
];

/// Attributes whose value is a URL.
pub(super) const URL_ATTRIBUTES: &[&str] = &["src", "href", "poster", "cite"];

const ALLOWED_SCHEMES: &[&str] = &[
    "apt:",
    "bitcoin:",
    "callto:",
    "dav:",
    "davs:",
    "ed2k://",
    "facetime://",
    "feed:",
    "ftp://",
    "geo:",
    "git://",
    "gopher://",
    "http://",
    "https://",
    "irc://",
    "irc6://",
    "ircs://",
    "itms://",
    "itms-apps://",
    "magnet:",
    "mailto:",
    "news:",
    "nntp:",
    "rtmp://",
    "sftp://",
    "sip:",
    "sips:",
    "skype:",
    "spotify:",
    "ssh://",
    "steam:",
    "svn://",
    "svn+ssh://",
    "tel:",
    "webcal://",
    "xmpp:",
];

/// Tracking pixels, share buttons and aggregator redirects.
const BLOCKED_RESOURCES: &[&str] = &[
    "feedsportal.com",
    "api.flattr.com",
    "stats.wordpress.com",
    "plus.google.com/share",
    "twitter.com/share",
    "feeds.feedburner.com",
    "pixel.wp.com",
];

/// Embed providers accepted as `iframe` sources. Subdomains match too.
const IFRAME_HOSTS: &[&str] = &[
    "bandcamp.com",
    "cdn.embedly.com",
    "dailymotion.com",
    "player.vimeo.com",
    "soundcloud.com",
    "vk.com",
    "youtube-nocookie.com",
    "youtube.com",
];

pub(super) const YOUTUBE_PRIVACY_HOST: &str = "www.youtube-nocookie.com";

pub(super) fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    lookup(ALLOWED_TAGS, tag)
}

pub(super) fn required_attributes(tag: &str) -> &'static [&'static str] {
    lookup(REQUIRED_ATTRIBUTES, tag).unwrap_or(&[])
}

pub(super) fn injected_attributes(tag: &str) -> &'static [(&'static str, &'static str)] {
    lookup(INJECTED_ATTRIBUTES, tag).unwrap_or(&[])
}

fn lookup<T: Copy>(table: &[(&str, T)], tag: &str) -> Option<T> {
    table.iter().find(|(name, _)| *name == tag).map(|(_, value)| *value)
}

pub(super) fn has_allowed_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ALLOWED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

pub(super) fn is_blocked_resource(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    BLOCKED_RESOURCES.iter().any(|blocked| lower.contains(blocked))
}

pub(super) fn is_allowed_iframe_host(host: &str) -> bool {
    IFRAME_HOSTS
        .iter()
        .any(|allowed| crate::util::host_matches(host, allowed))
}
