//! Utility functions shared by the fetch, parse and sanitize layers.
//!
//! - **URL handling**: validation of user input and resolution of relative links
//! - **Text processing**: entity decoding, tag stripping, Unicode-safe truncation
//! - **Hashing**: the stable content hash used as entry identity
//!
//! # Examples
//!
//! ```
//! use feedwright::util::{absolute_url, strip_tags, truncate_chars};
//!
//! assert_eq!(
//!     absolute_url("https://example.com/blog/", "post/1"),
//!     "https://example.com/blog/post/1"
//! );
//! assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
//! assert_eq!(truncate_chars("Hello World", 6), "Hello…");
//! ```

mod text;
mod urls;

use sha2::{Digest, Sha256};

pub use urls::{
    absolute_url, host, host_matches, is_absolute_http_url, root_url, validate_url,
    UrlValidationError,
};
pub use text::{
    collapse_whitespace, decode_entities, escape_html, is_xml_char, strip_invalid_xml_chars,
    strip_tags, truncate_chars,
};

/// SHA-256 of `value` as lowercase hex.
pub fn hash(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}
