use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a user-supplied URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Parses `url_str` and requires an absolute `http`/`https` URL.
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Resolves `href` against `base`.
///
/// Absolute URLs are returned normalized, protocol-relative URLs inherit the
/// base scheme (or `https` without a usable base). When resolution fails the
/// trimmed literal is returned unchanged.
pub fn absolute_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    if let Ok(parsed) = Url::parse(href) {
        return parsed.to_string();
    }

    match Url::parse(base.trim()) {
        Ok(base) => base
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_owned()),
        Err(_) => match href.strip_prefix("//") {
            Some(rest) => Url::parse(&format!("https://{rest}"))
                .map(String::from)
                .unwrap_or_else(|_| href.to_owned()),
            None => href.to_owned(),
        },
    }
}

/// Returns true for absolute `http`/`https` URLs.
pub fn is_absolute_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Returns `scheme://host[:port]/` for `website_url`, or the input unchanged
/// when it cannot be parsed.
pub fn root_url(website_url: &str) -> String {
    match Url::parse(website_url) {
        Ok(mut url) => {
            url.set_path("/");
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => website_url.to_owned(),
    }
}

/// Lower-cased host of `value`, if it parses as an absolute URL with a host.
pub fn host(value: &str) -> Option<String> {
    Url::parse(value)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

/// Returns true when `host` equals `domain` or is one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
