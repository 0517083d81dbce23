use serde::Serialize;

use super::encoding::to_utf8;
use super::FetchError;

/// The outcome of one HTTP request.
///
/// Created per fetch and consumed right away by decoding and parsing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    #[serde(skip)]
    pub body: Vec<u8>,
    pub status_code: u16,
    /// URL after following redirects.
    pub effective_url: String,
    pub etag: String,
    pub last_modified: String,
    pub expires: String,
    pub content_type: String,
    pub content_length: Option<u64>,
}

impl Response {
    /// Builds a response from its parts, applying the `Expires: 0` rule: an
    /// origin that disables caching this way gets its validators ignored.
    pub(crate) fn new(
        status_code: u16,
        effective_url: String,
        headers: &reqwest::header::HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        let header = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_owned())
                .unwrap_or_default()
        };

        let expires = header(reqwest::header::EXPIRES);
        let (etag, last_modified) = if expires == "0" {
            (String::new(), String::new())
        } else {
            (header(reqwest::header::ETAG), header(reqwest::header::LAST_MODIFIED))
        };

        let content_length = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Self {
            body,
            status_code,
            effective_url,
            etag,
            last_modified,
            expires,
            content_type: header(reqwest::header::CONTENT_TYPE),
            content_length,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Whether the resource changed relative to the validators stored from the
    /// previous fetch.
    ///
    /// `304 Not Modified`, or a non-empty ETag/Last-Modified identical to the
    /// stored one, both mean unchanged.
    pub fn is_modified(&self, last_etag: &str, last_modified: &str) -> bool {
        if self.status_code == 304 {
            return false;
        }
        if !self.etag.is_empty() && self.etag == last_etag {
            return false;
        }
        if !self.last_modified.is_empty() && self.last_modified == last_modified {
            return false;
        }
        true
    }

    /// Maps error statuses to their [`FetchError`] category.
    ///
    /// # Errors
    ///
    /// 401, 403, 404 and 429 get dedicated variants; any other status of 400
    /// or above is [`FetchError::UnexpectedStatus`].
    pub fn check_status(&self) -> Result<(), FetchError> {
        match self.status_code {
            401 => Err(FetchError::Unauthorized),
            403 => Err(FetchError::Forbidden),
            404 => Err(FetchError::NotFound),
            429 => Err(FetchError::TooManyRequests),
            code if code >= 400 => Err(FetchError::UnexpectedStatus(code)),
            _ => Ok(()),
        }
    }

    /// Body decoded to UTF-8 using the response's Content-Type and the
    /// document's own declaration.
    pub fn body_text(&self) -> String {
        to_utf8(&self.body, &self.content_type)
    }

    /// Like [`Response::body_text`], failing when nothing but whitespace came back.
    ///
    /// # Errors
    ///
    /// [`FetchError::EmptyBody`] for an empty or blank body.
    pub fn feed_text(&self) -> Result<String, FetchError> {
        let text = self.body_text();
        if text.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(text)
    }
}
