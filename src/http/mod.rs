//! Conditional HTTP fetching.
//!
//! [`RequestBuilder`] carries the per-request configuration and performs one
//! GET or POST; the result is a [`Response`] or a classified [`FetchError`].
//! Callers decide about retries. Nothing here retries or spawns.

mod client;
mod encoding;
mod response;

use thiserror::Error;

pub use client::{RequestBuilder, DEFAULT_USER_AGENT};
pub use encoding::{charset_from_content_type, to_utf8};
pub use response::Response;

/// User-facing fetch failures.
///
/// The variants are categories, not transport details: callers branch on
/// them and display them. [`FetchError::key`] gives a stable translation key.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unable to configure the HTTP client: {0}")]
    Client(String),

    #[error("Invalid SSL certificate (original error: {0})")]
    InvalidCertificate(String),

    #[error("This website is temporarily unreachable (original error: {0})")]
    TemporarilyUnreachable(String),

    #[error("This website is permanently unreachable (original error: {0})")]
    PermanentlyUnreachable(String),

    #[error("Website unreachable, the request timed out after {0} seconds")]
    Timeout(u64),

    #[error("The response is too large (maximum {0} bytes)")]
    BodyTooLarge(u64),

    #[error("Access unauthorized, please verify your credentials")]
    Unauthorized,

    #[error("Access forbidden, this website may require authentication")]
    Forbidden,

    #[error("Resource not found (404), this feed doesn't exist anymore")]
    NotFound,

    #[error("Too many requests, the website is rate limiting this client")]
    TooManyRequests,

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("This feed is empty")]
    EmptyBody,

    #[error("Unable to complete the request: {0}")]
    Request(String),
}

impl FetchError {
    /// Stable translation key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "error.http_invalid_url",
            FetchError::Client(_) => "error.http_client",
            FetchError::InvalidCertificate(_) => "error.http_invalid_certificate",
            FetchError::TemporarilyUnreachable(_) => "error.http_temporarily_unreachable",
            FetchError::PermanentlyUnreachable(_) => "error.http_permanently_unreachable",
            FetchError::Timeout(_) => "error.http_timeout",
            FetchError::BodyTooLarge(_) => "error.http_body_too_large",
            FetchError::Unauthorized => "error.http_unauthorized",
            FetchError::Forbidden => "error.http_forbidden",
            FetchError::NotFound => "error.http_not_found",
            FetchError::TooManyRequests => "error.http_too_many_requests",
            FetchError::UnexpectedStatus(_) => "error.http_unexpected_status",
            FetchError::EmptyBody => "error.http_empty_body",
            FetchError::Request(_) => "error.http_request",
        }
    }

    /// True for failures a scheduler may reasonably retry later.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            FetchError::TemporarilyUnreachable(_)
                | FetchError::Timeout(_)
                | FetchError::TooManyRequests
                | FetchError::UnexpectedStatus(500..=599)
        )
    }
}
