//! Release metadata for a family of projects, read from the GitHub releases
//! API with fallback to mirrored copies and a local time-boxed cache.

pub mod backup;
pub mod cache;
pub mod config;
pub mod contributors;
pub mod datefmt;
pub mod feed;
pub mod geo;
pub mod metrics_defs;
pub mod normalize;
pub mod primary;
pub mod structure;
pub mod types;

#[cfg(test)]
mod testutils;

pub use feed::{BuildFeed, Builds, FeedOutcome, Origin};
pub use types::{BuildRecord, ReleaseType};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by every source. GitHub rejects requests without a
/// user agent.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}
