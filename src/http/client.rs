use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONNECTION, CONTENT_TYPE, COOKIE,
    IF_MODIFIED_SINCE, IF_NONE_MATCH,
};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

use super::{FetchError, Response};
use crate::config::Config;

pub const DEFAULT_USER_AGENT: &str = concat!("feedwright/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_BODY_SIZE: u64 = 15 * 1024 * 1024;
const MAX_REDIRECTS: usize = 10;

/// Per-request configuration.
///
/// Builder methods consume and return `self`; [`RequestBuilder::execute`]
/// borrows it, so one builder can issue several requests.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), feedwright::http::FetchError> {
/// use feedwright::http::RequestBuilder;
///
/// let response = RequestBuilder::new()
///     .with_cache_headers("\"v1\"", "")
///     .execute("https://example.org/feed.xml")
///     .await?;
/// if response.is_modified("\"v1\"", "") {
///     println!("{}", response.body_text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RequestBuilder {
    headers: HeaderMap,
    user_agent: String,
    username: Option<String>,
    password: Option<SecretString>,
    authorization: Option<SecretString>,
    proxy_url: Option<String>,
    use_proxy: bool,
    timeout: Duration,
    max_body_size: u64,
    ignore_tls_errors: bool,
    without_redirects: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            username: None,
            password: None,
            authorization: None,
            proxy_url: None,
            use_proxy: false,
            timeout: DEFAULT_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            ignore_tls_errors: false,
            without_redirects: false,
        }
    }

    /// A builder seeded with the process-wide HTTP settings.
    ///
    /// The configured proxy is remembered but only used after
    /// [`RequestBuilder::use_proxy`].
    pub fn from_config(config: &Config) -> Self {
        let builder = Self::new()
            .with_user_agent(&config.user_agent)
            .with_timeout(Duration::from_secs(config.http_client_timeout))
            .with_max_body_size(config.http_client_max_body_size.saturating_mul(1024 * 1024))
            .ignore_tls_errors(config.allow_self_signed_certificates);
        match config.http_client_proxy.as_deref() {
            Some(proxy) => builder.with_proxy(proxy),
            None => builder,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        if !user_agent.trim().is_empty() {
            self.user_agent = user_agent.trim().to_owned();
        }
        self
    }

    /// HTTP Basic credentials, applied only when both parts are non-empty.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        if !username.is_empty() && !password.is_empty() {
            self.username = Some(username.to_owned());
            self.password = Some(SecretString::from(password.to_owned()));
        }
        self
    }

    /// A raw `Authorization` header value. Takes precedence over credentials.
    pub fn with_authorization(mut self, value: &str) -> Self {
        if !value.is_empty() {
            self.authorization = Some(SecretString::from(value.to_owned()));
        }
        self
    }

    /// Adds a custom header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid request header"),
        }
        self
    }

    pub fn with_cookie(self, cookie: &str) -> Self {
        if cookie.is_empty() {
            return self;
        }
        self.with_header(COOKIE.as_str(), cookie)
    }

    /// Conditional request validators from the previous fetch. Empty values are
    /// not sent.
    pub fn with_cache_headers(mut self, etag: &str, last_modified: &str) -> Self {
        if !etag.is_empty() {
            self = self.with_header(IF_NONE_MATCH.as_str(), etag);
        }
        if !last_modified.is_empty() {
            self = self.with_header(IF_MODIFIED_SINCE.as_str(), last_modified);
        }
        self
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Self {
        if !proxy_url.trim().is_empty() {
            self.proxy_url = Some(proxy_url.trim().to_owned());
        }
        self
    }

    /// Routes the request through the configured proxy, if there is one.
    pub fn use_proxy(mut self, enabled: bool) -> Self {
        self.use_proxy = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    pub fn with_max_body_size(mut self, bytes: u64) -> Self {
        if bytes > 0 {
            self.max_body_size = bytes;
        }
        self
    }

    /// Accept invalid or self-signed certificates.
    pub fn ignore_tls_errors(mut self, ignore: bool) -> Self {
        self.ignore_tls_errors = ignore;
        self
    }

    /// Return the first redirect response instead of following it.
    pub fn without_redirects(mut self) -> Self {
        self.without_redirects = true;
        self
    }

    /// Performs a GET request.
    ///
    /// # Errors
    ///
    /// Transport failures are classified into certificate, timeout,
    /// temporary and permanent categories; oversized bodies fail with
    /// [`FetchError::BodyTooLarge`]. HTTP error statuses are *not* errors here,
    /// see [`Response::check_status`].
    pub async fn execute(&self, url: &str) -> Result<Response, FetchError> {
        let client = self.build_client()?;
        let url = parse_url(url)?;
        let request = self.decorate(client.get(url.clone()));
        self.send(request, &url).await
    }

    /// Performs a POST request with the given body.
    ///
    /// # Errors
    ///
    /// Same as [`RequestBuilder::execute`].
    pub async fn execute_post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<reqwest::Body>,
    ) -> Result<Response, FetchError> {
        let client = self.build_client()?;
        let url = parse_url(url)?;
        let request = self
            .decorate(client.post(url.clone()))
            .header(CONTENT_TYPE, content_type)
            .body(body);
        self.send(request, &url).await
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        let redirect = if self.without_redirects {
            Policy::none()
        } else {
            redirect_policy()
        };

        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .redirect(redirect)
            .danger_accept_invalid_certs(self.ignore_tls_errors);

        builder = match (&self.proxy_url, self.use_proxy) {
            (Some(proxy), true) => {
                let proxy = reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| FetchError::Client(format!("invalid proxy URL: {e}")))?;
                builder.proxy(proxy)
            }
            _ => builder.no_proxy(),
        };

        builder.build().map_err(|e| FetchError::Client(e.to_string()))
    }

    fn decorate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request
            .headers(self.headers.clone())
            .header(ACCEPT, "*/*")
            .header(CONNECTION, "close");

        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization.expose_secret());
        } else if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password.expose_secret()));
        }

        request
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<Response, FetchError> {
        tracing::debug!(
            url = %url,
            timeout_secs = self.timeout.as_secs(),
            use_proxy = self.use_proxy && self.proxy_url.is_some(),
            follow_redirects = !self.without_redirects,
            "Sending request"
        );

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let effective_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = read_limited_bytes(response, self.max_body_size)
            .await
            .map_err(|e| match e {
                ReadError::TooLarge => FetchError::BodyTooLarge(self.max_body_size),
                ReadError::Transport(e) => self.classify(e),
            })?;

        tracing::debug!(
            url = %url,
            effective_url = %effective_url,
            status = status,
            bytes = body.len(),
            "Received response"
        );

        Ok(Response::new(status, effective_url, &headers, body))
    }

    /// Maps a transport error onto its user-facing category.
    fn classify(&self, err: reqwest::Error) -> FetchError {
        let detail = error_chain(&err)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");

        if err.is_timeout() {
            return FetchError::Timeout(self.timeout.as_secs());
        }

        if error_chain(&err).any(|e| e.to_string().to_ascii_lowercase().contains("certificate")) {
            return FetchError::InvalidCertificate(detail);
        }

        let io_kind = error_chain(&err)
            .find_map(|e| e.downcast_ref::<std::io::Error>())
            .map(std::io::Error::kind);

        match io_kind {
            Some(kind) if is_temporary(kind) => FetchError::TemporarilyUnreachable(detail),
            Some(_) => FetchError::PermanentlyUnreachable(detail),
            None if err.is_connect() => FetchError::PermanentlyUnreachable(detail),
            None => FetchError::Request(detail),
        }
    }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))
}

fn is_temporary(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}

fn error_chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// Follows up to [`MAX_REDIRECTS`] hops and refuses loops.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len(),
            "Following redirect"
        );

        attempt.follow()
    })
}

enum ReadError {
    TooLarge,
    Transport(reqwest::Error),
}

/// Reads the body, enforcing `limit` against the declared length first and
/// against the streamed size otherwise.
async fn read_limited_bytes(response: reqwest::Response, limit: u64) -> Result<Vec<u8>, ReadError> {
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(ReadError::TooLarge);
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ReadError::Transport)?;
        if (bytes.len() as u64).saturating_add(chunk.len() as u64) > limit {
            return Err(ReadError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
