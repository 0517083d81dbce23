//! Configuration file parser for `feedwright.toml`.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Environment variables override whatever the file sets; see
//! [`Config::apply_env`].
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::http::DEFAULT_USER_AGENT;
use crate::proxy::ImageProxyMode;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

impl ConfigError {
    /// Stable translation key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "error.config_io",
            ConfigError::Parse(_) => "error.config_parse",
            ConfigError::TooLarge(_) => "error.config_too_large",
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Process-wide HTTP and rewriting settings.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The proxy URL may embed credentials, so the Debug impl masks its password.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Request timeout in seconds.
    pub http_client_timeout: u64,

    /// Response body ceiling in MiB.
    pub http_client_max_body_size: u64,

    /// Proxy used by requests that opt in.
    pub http_client_proxy: Option<String>,

    pub allow_self_signed_certificates: bool,

    pub proxy_images: ImageProxyMode,

    /// Route template containing `{encodedURL}`.
    pub proxy_route: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_client_timeout: 20,
            http_client_max_body_size: 15,
            http_client_proxy: None,
            allow_self_signed_certificates: false,
            proxy_images: ImageProxyMode::HttpOnly,
            proxy_route: "/proxy/{encodedURL}".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("http_client_timeout", &self.http_client_timeout)
            .field("http_client_max_body_size", &self.http_client_max_body_size)
            .field(
                "http_client_proxy",
                &self.http_client_proxy.as_deref().map(redact_proxy_password),
            )
            .field(
                "allow_self_signed_certificates",
                &self.allow_self_signed_certificates,
            )
            .field("proxy_images", &self.proxy_images)
            .field("proxy_route", &self.proxy_route)
            .finish()
    }
}

fn redact_proxy_password(proxy: &str) -> String {
    match url::Url::parse(proxy) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("[REDACTED]")).is_err() {
                return "[REDACTED]".to_string();
            }
            parsed.to_string()
        }
        Ok(_) => proxy.to_string(),
        Err(_) => "[REDACTED]".to_string(),
    }
}

const KNOWN_KEYS: [&str; 7] = [
    "user_agent",
    "http_client_timeout",
    "http_client_max_body_size",
    "http_client_proxy",
    "allow_self_signed_certificates",
    "proxy_images",
    "proxy_route",
];

impl Config {
    /// Maximum config file size (1 MiB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// Environment overrides are not applied here; call
    /// [`Config::from_env`] or [`Config::apply_env`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            timeout_secs = config.http_client_timeout,
            proxy_images = %config.proxy_images,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Loads `path` and applies the process environment on top.
    pub fn from_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    ///
    /// Unparseable or empty values keep the current setting.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(user_agent) = var("HTTP_CLIENT_USER_AGENT") {
            self.user_agent = user_agent;
        }
        if let Some(timeout) = var("HTTP_CLIENT_TIMEOUT") {
            apply_positive("HTTP_CLIENT_TIMEOUT", &timeout, &mut self.http_client_timeout);
        }
        if let Some(size) = var("HTTP_CLIENT_MAX_BODY_SIZE") {
            apply_positive(
                "HTTP_CLIENT_MAX_BODY_SIZE",
                &size,
                &mut self.http_client_max_body_size,
            );
        }
        if let Some(proxy) = var("HTTP_CLIENT_PROXY") {
            match url::Url::parse(&proxy) {
                Ok(_) => self.http_client_proxy = Some(proxy),
                Err(e) => tracing::warn!(var = "HTTP_CLIENT_PROXY", error = %e, "Ignoring invalid proxy URL"),
            }
        }
        if let Some(mode) = var("PROXY_IMAGES") {
            match mode.parse::<ImageProxyMode>() {
                Ok(mode) => self.proxy_images = mode,
                Err(e) => tracing::warn!(var = "PROXY_IMAGES", error = %e, "Ignoring invalid value"),
            }
        }
        if let Some(route) = var("PROXY_ROUTE") {
            self.proxy_route = route;
        }
    }
}

fn apply_positive(name: &str, raw: &str, target: &mut u64) {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => *target = value,
        _ => tracing::warn!(var = name, value = %raw, "Ignoring invalid value"),
    }
}

// ============================================================================
// Tests
// ============================================================================
