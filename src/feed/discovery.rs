use scraper::{Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use super::{detect_format, parse_feed, FeedFormat};
use crate::config::Config;
use crate::http::{FetchError, RequestBuilder};
use crate::util::{absolute_url, is_absolute_http_url, root_url, validate_url};

/// Paths probed when a page advertises no feed, with the format they imply.
const WELL_KNOWN_PATHS: [(&str, FeedFormat); 5] = [
    ("atom.xml", FeedFormat::Atom),
    ("feed.xml", FeedFormat::Atom),
    ("feed/", FeedFormat::Atom),
    ("rss.xml", FeedFormat::Rss),
    ("rss/", FeedFormat::Rss),
];

const YOUTUBE_FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";

static FEED_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[href][type]").expect("feed link selector is valid"));

static CHANNEL_ID_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[itemprop="channelId"][content]"#).expect("channel id selector is valid")
});

/// A candidate feed found for a website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub title: String,
    pub url: String,
    pub format: FeedFormat,
}

impl Subscription {
    fn untitled(url: String, format: FeedFormat) -> Self {
        Self {
            title: url.clone(),
            url,
            format,
        }
    }
}

/// Errors that can occur during subscription discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The website URL is not an absolute http(s) URL.
    #[error("Invalid website URL: {0}")]
    InvalidUrl(String),

    /// The website itself could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl DiscoveryError {
    /// Stable translation key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            DiscoveryError::InvalidUrl(_) => "error.discovery_invalid_url",
            DiscoveryError::Fetch(e) => e.key(),
        }
    }
}

/// Request settings used while probing a website.
#[derive(Debug, Default)]
pub struct FinderOptions {
    config: Config,
    user_agent: Option<String>,
    username: Option<String>,
    password: Option<SecretString>,
    cookie: Option<String>,
    use_proxy: bool,
}

impl FinderOptions {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_owned());
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_owned());
        self.password = Some(SecretString::from(password.to_owned()));
        self
    }

    pub fn with_cookie(mut self, cookie: &str) -> Self {
        self.cookie = Some(cookie.to_owned());
        self
    }

    pub fn use_proxy(mut self, enabled: bool) -> Self {
        self.use_proxy = enabled;
        self
    }

    fn request(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::from_config(&self.config).use_proxy(self.use_proxy);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.with_credentials(username, password.expose_secret());
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.with_cookie(cookie);
        }
        builder
    }
}

/// Finds feeds for a website URL.
///
/// In order: YouTube channel/playlist URLs map straight to their feed; the
/// URL itself is fetched and returned if it already is a feed (or, for a
/// YouTube video page, mapped to its channel feed); `<link>` elements
/// advertising feeds are collected; finally well-known feed paths are probed
/// under the site root and the page's directory. An empty result means
/// nothing was found.
///
/// # Errors
///
/// - [`DiscoveryError::InvalidUrl`] unless `website_url` is absolute http(s)
/// - [`DiscoveryError::Fetch`] when the page itself cannot be fetched
pub async fn find_subscriptions(
    website_url: &str,
    options: &FinderOptions,
) -> Result<Vec<Subscription>, DiscoveryError> {
    let url = validate_url(website_url).map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;

    if let Some(feed_url) = youtube_feed_url(&url) {
        tracing::debug!(url = %url, feed_url = %feed_url, "Mapped YouTube URL to its feed");
        return Ok(vec![Subscription::untitled(feed_url, FeedFormat::Atom)]);
    }

    let response = options.request().execute(url.as_str()).await?;
    response.check_status()?;

    let page_url = response.effective_url.clone();
    let body = response.body_text();

    let format = detect_format(&body);
    if format != FeedFormat::Unknown {
        let title = parse_feed(&page_url, &body)
            .map(|feed| feed.title)
            .unwrap_or_else(|_| page_url.clone());
        tracing::debug!(url = %page_url, format = %format, "Website URL is a feed");
        return Ok(vec![Subscription {
            title,
            url: page_url,
            format,
        }]);
    }

    let document = Html::parse_document(&body);

    if is_youtube_video(&url) {
        if let Some(channel_id) = youtube_channel_id(&document) {
            let feed_url = format!("{YOUTUBE_FEED_URL}?channel_id={channel_id}");
            return Ok(vec![Subscription::untitled(feed_url, FeedFormat::Atom)]);
        }
    }

    let linked = feed_links(&document, &page_url);
    if !linked.is_empty() {
        tracing::debug!(url = %page_url, count = linked.len(), "Found advertised feeds");
        return Ok(linked);
    }

    Ok(probe_well_known_paths(&page_url, options).await)
}

fn is_youtube_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("youtube.com" | "www.youtube.com" | "m.youtube.com")
    )
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// Feed URL for YouTube channel and playlist pages.
fn youtube_feed_url(url: &Url) -> Option<String> {
    if !is_youtube_host(url) {
        return None;
    }

    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next()) {
        (Some("channel"), Some(id)) if !id.is_empty() => {
            Some(format!("{YOUTUBE_FEED_URL}?channel_id={id}"))
        }
        (Some("playlist"), _) => {
            query_value(url, "list").map(|id| format!("{YOUTUBE_FEED_URL}?playlist_id={id}"))
        }
        _ => None,
    }
}

fn is_youtube_video(url: &Url) -> bool {
    is_youtube_host(url) && url.path() == "/watch" && query_value(url, "v").is_some()
}

fn youtube_channel_id(document: &Html) -> Option<String> {
    document
        .select(&CHANNEL_ID_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_owned)
}

fn link_format(mime_type: &str) -> Option<FeedFormat> {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/rss+xml" => Some(FeedFormat::Rss),
        "application/atom+xml" => Some(FeedFormat::Atom),
        "application/json" | "application/feed+json" => Some(FeedFormat::Json),
        _ => None,
    }
}

/// Feeds advertised through `<link type=… href=…>`, de-duplicated by URL.
fn feed_links(document: &Html, page_url: &str) -> Vec<Subscription> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for link in document.select(&FEED_LINK_SELECTOR) {
        let element = link.value();
        let Some(format) = element.attr("type").and_then(link_format) else {
            continue;
        };
        let Some(href) = element.attr("href") else {
            continue;
        };

        let url = absolute_url(page_url, href);
        if !is_absolute_http_url(&url) || !seen.insert(url.clone()) {
            continue;
        }

        let title = element
            .attr("title")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(|| url.clone(), str::to_owned);

        found.push(Subscription { title, url, format });
    }

    found
}

/// Directories whose well-known paths are probed: the site root, then the
/// page's own directory when it differs.
///
/// A last segment that looks like a file name (`post.html`) is dropped;
/// any other segment (`/blog`) is treated as a directory.
fn probe_bases(page_url: &str) -> Vec<String> {
    let root = root_url(page_url);
    let mut bases = vec![root.clone()];

    if let Ok(mut url) = Url::parse(page_url) {
        url.set_query(None);
        url.set_fragment(None);

        let mut path = url.path().to_owned();
        if !path.ends_with('/') {
            let file_start = path.rfind('/').map_or(0, |i| i + 1);
            if path[file_start..].contains('.') {
                path.truncate(file_start);
            } else {
                path.push('/');
            }
        }
        url.set_path(&path);

        let directory = url.to_string();
        if directory != root {
            bases.push(directory);
        }
    }

    bases
}

async fn probe_well_known_paths(page_url: &str, options: &FinderOptions) -> Vec<Subscription> {
    // Redirects are not followed: many sites send unknown paths to the home page.
    let request = options.request().without_redirects();
    let mut found = Vec::new();

    for base in probe_bases(page_url) {
        for (path, format) in WELL_KNOWN_PATHS {
            let candidate = absolute_url(&base, path);
            match request.execute(&candidate).await {
                Ok(response) if response.status_code == 200 => {
                    tracing::debug!(url = %candidate, "Well-known feed path responded");
                    found.push(Subscription::untitled(candidate, format));
                }
                Ok(response) => {
                    tracing::trace!(url = %candidate, status = response.status_code, "Probe missed");
                }
                Err(e) => {
                    tracing::debug!(url = %candidate, error = %e, "Probe failed");
                }
            }
        }
    }

    found
}
