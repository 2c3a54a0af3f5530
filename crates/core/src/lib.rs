//! Core domain types and shared logic for filedrop.
//!
//! This crate defines the data model used across all other crates:
//! - Configuration snapshot and limits
//! - Content digests
//! - Short code codec and public locators
//! - Content-type sniffing

pub mod config;
pub mod error;
pub mod hash;
pub mod locator;
pub mod shortcode;
pub mod sniff;

pub use error::{Error, Result};
pub use hash::{ContentDigest, ContentHasher};
pub use locator::Locator;
pub use shortcode::ShortCodeCodec;

/// Current unix time in seconds, the clock every stored timestamp uses.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
