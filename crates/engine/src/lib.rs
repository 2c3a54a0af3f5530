//! Storage engine for filedrop.
//!
//! This crate ties the blob store, the object registry and the short code
//! codec together:
//! - Plain and bucket/alias uploads with deduplication
//! - Downloads by short code or alias with content-type sniffing
//! - Per-origin rate limiting evaluated against the registry
//! - Age and capacity eviction, run after each request

pub mod download;
pub mod error;
pub mod eviction;
pub mod metrics;
pub mod ratelimit;
pub mod state;
pub mod upload;

pub use download::Download;
pub use error::{EngineError, EngineResult};
pub use eviction::{EvictionEngine, SweepReport};
pub use ratelimit::{RateLimiter, RateWindow};
pub use state::Engine;
pub use upload::UploadReceipt;
