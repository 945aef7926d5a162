//! Source connectors for collecting NYC public-health signals.
//!
//! This module contains submodules for the four data sources. Each connector
//! follows a consistent pattern:
//!
//! 1. **Fetching**: Download the source document (feed, API page, HTML, CSV)
//! 2. **Parsing**: Turn the raw body into typed records
//! 3. **Filtering**: Keep only health-relevant records inside the lookback window
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Local news feeds | [`feeds`] | RSS 2.0 | Gothamist, NY Post Metro, NYT New York by default |
//! | NYC 311 | [`open_data`] | Socrata-style JSON API | Paged; optional app token raises rate limits |
//! | DOHMH press room | [`press`] | HTML scraping | Recent press release listing page |
//! | ED respiratory data | [`respiratory`] | Published CSV | Citywide emergency department visit shares |
//!
//! # Common Patterns
//!
//! Each connector module exports a `collect_*` entry point. Connectors:
//! - Share one HTTP client via [`http_client`]
//! - Fail independently (a dead source never aborts the run)
//! - Parse defensively (malformed entries are logged and skipped)

pub mod feeds;
pub mod open_data;
pub mod press;
pub mod respiratory;

use once_cell::sync::Lazy;
use std::time::Duration;

/// Browser-like user agent. The city endpoints answer plain library agents
/// with 403s.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client")
});

/// The process-wide HTTP client shared by every connector.
pub fn http_client() -> &'static reqwest::Client {
    &HTTP_CLIENT
}
