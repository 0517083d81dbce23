//! Feed ingestion core: conditional fetching, format detection, parsing of
//! Atom, RSS, RDF and JSON Feed into one model, permissive date parsing,
//! HTML sanitizing and subscription discovery.
//!
//! Every operation works on one feed and owns its results; nothing here
//! spawns tasks, retries or keeps state between calls.

pub mod config;
pub mod date;
pub mod feed;
pub mod http;
pub mod proxy;
pub mod sanitizer;
pub mod util;
