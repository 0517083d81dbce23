//! Image proxy URL rewriting.
//!
//! Entry images can be served through a local route so that readers never
//! contact third-party hosts directly (or load `http:` images on an `https:`
//! page). The original URL is base64url-encoded into the route.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::Config;
use crate::sanitizer::{ImageCandidate, ImageCandidates};

const PLACEHOLDER: &str = "{encodedURL}";

/// Which image URLs get proxied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageProxyMode {
    /// Leave every URL alone.
    None,
    /// Proxy plain `http:` images only (mixed-content avoidance).
    #[default]
    HttpOnly,
    /// Proxy `http:` and `https:` images.
    All,
}

#[derive(Debug, Error)]
#[error("Unknown image proxy mode {0:?} (expected none, http-only or all)")]
pub struct ProxyModeError(String);

impl ProxyModeError {
    pub fn key(&self) -> &'static str {
        "error.proxy_mode"
    }
}

impl FromStr for ImageProxyMode {
    type Err = ProxyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "http-only" => Ok(Self::HttpOnly),
            "all" => Ok(Self::All),
            other => Err(ProxyModeError(other.to_owned())),
        }
    }
}

impl fmt::Display for ImageProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::HttpOnly => "http-only",
            Self::All => "all",
        })
    }
}

/// Rewrites image URLs onto a proxy route such as `/proxy/{encodedURL}`.
#[derive(Debug, Clone)]
pub struct ImageProxy {
    mode: ImageProxyMode,
    route: String,
}

impl ImageProxy {
    pub fn new(mode: ImageProxyMode, route: impl Into<String>) -> Self {
        let route = route.into();
        if !route.contains(PLACEHOLDER) {
            tracing::warn!(route = %route, "Proxy route has no {{encodedURL}} placeholder, appending it");
        }
        Self { mode, route }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.proxy_images, config.proxy_route.clone())
    }

    pub fn mode(&self) -> ImageProxyMode {
        self.mode
    }

    /// Proxied form of `url`, or `None` when the mode leaves it untouched.
    pub fn proxify(&self, url: &str) -> Option<String> {
        let lower = url.trim_start().to_ascii_lowercase();
        let applies = match self.mode {
            ImageProxyMode::None => false,
            ImageProxyMode::HttpOnly => lower.starts_with("http://"),
            ImageProxyMode::All => lower.starts_with("http://") || lower.starts_with("https://"),
        };
        if !applies {
            return None;
        }

        let encoded = URL_SAFE.encode(url.trim().as_bytes());
        Some(if self.route.contains(PLACEHOLDER) {
            self.route.replace(PLACEHOLDER, &encoded)
        } else {
            format!("{}/{}", self.route.trim_end_matches('/'), encoded)
        })
    }

    /// Proxies every candidate URL the mode applies to, keeping descriptors.
    pub fn rewrite_srcset(&self, candidates: ImageCandidates) -> ImageCandidates {
        candidates
            .into_iter()
            .map(|candidate| match self.proxify(&candidate.image_url) {
                Some(image_url) => ImageCandidate {
                    image_url,
                    ..candidate
                },
                None => candidate,
            })
            .collect()
    }
}
