//! Data models for the records emitted by the connectors.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: a health-related item from a local news RSS feed
//! - [`Complaint`]: a 311 service request from the NYC Open Data API
//! - [`PressRelease`]: a disease-related NYC DOHMH press release
//! - [`RespiratoryReading`]: one row of the emergency-department illness data
//! - [`HarvestSnapshot`]: everything collected by a single run
//!
//! All records are immutable once created. Each run of the collector produces
//! a fresh set; there is no update or deletion lifecycle.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A health-related news article emitted by the feed connector.
///
/// Only items whose title or summary contains at least one configured health
/// keyword become `Article`s, so `matched_keywords` is non-empty by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The configured name of the feed the item came from (e.g. "Gothamist").
    pub source: String,
    /// The item title.
    pub title: String,
    /// Publication timestamp from the feed's `pubDate`, when it parsed.
    pub published_at: Option<DateTime<Utc>>,
    /// The item's link.
    pub url: String,
    /// The item description with markup stripped and whitespace collapsed.
    pub summary: Option<String>,
    /// The lowercase keywords that matched the title or summary, in
    /// configuration order.
    pub matched_keywords: Vec<String>,
}

/// Where a 311 complaint happened.
///
/// The dataset usually carries a street address; some rows only have
/// coordinates. An address is preferred when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// A street address such as "125 WORTH STREET".
    Address(String),
    /// A WGS 84 latitude/longitude pair.
    Coordinates { latitude: f64, longitude: f64 },
}

impl Location {
    /// Build a location from the raw address and coordinate fields of a 311
    /// row. A non-blank address wins; otherwise both coordinates are required.
    pub fn from_parts(
        address: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Option<Self> {
        if let Some(addr) = address {
            let addr = addr.trim();
            if !addr.is_empty() {
                return Some(Location::Address(addr.to_string()));
            }
        }
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Location::Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// An environmental-health 311 service request emitted by the open data
/// connector.
///
/// Timestamps stay naive: the dataset publishes "floating" timestamps in
/// local NYC time with no offset, and inventing one here would misstate the
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    /// The dataset's unique key for the service request.
    pub unique_key: String,
    /// The complaint type, e.g. "Rodent" or "Food Poisoning".
    pub complaint_type: String,
    /// The finer-grained descriptor, e.g. "Rat Sighting".
    pub descriptor: Option<String>,
    /// The borough as published, e.g. "QUEENS".
    pub borough: Option<String>,
    /// When the request was created, in local NYC time.
    pub created_at: Option<NaiveDateTime>,
    /// Street address or coordinates, when the row carries either.
    pub location: Option<Location>,
    /// The request status, e.g. "Open" or "Closed".
    pub status: Option<String>,
}

/// A disease-related press release scraped from the NYC DOHMH press room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressRelease {
    /// The publishing source name.
    pub source: String,
    /// The release title.
    pub title: String,
    /// The publication date shown next to the release.
    pub published_on: NaiveDate,
    /// Absolute URL of the release page.
    pub url: String,
    /// The lowercase keywords that matched the title, in configuration order.
    pub matched_keywords: Vec<String>,
}

/// One row of the citywide emergency-department respiratory illness data.
///
/// A row is one (metric, submetric) series sample, e.g. metric
/// "COVID-19 visits" with submetric "Overall" or a borough name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespiratoryReading {
    /// The observation date.
    pub date: NaiveDate,
    /// The measured series, e.g. "Influenza visits".
    pub metric: String,
    /// The series breakdown, e.g. "Overall", "Brooklyn".
    pub submetric: String,
    /// The measured value (typically a percentage of ED visits).
    pub value: f64,
    /// The dataset's display label for the value, when present.
    pub display: Option<String>,
}

/// Everything one run of the collector produced.
///
/// Each execution writes exactly one snapshot. The `edition` field
/// categorizes runs as:
/// - `"morning"`: 00:00 - 08:00
/// - `"afternoon"`: 08:00 - 16:00
/// - `"evening"`: 16:00 - 24:00
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSnapshot {
    /// The run date in `YYYY-MM-DD` format, local time.
    pub local_date: String,
    /// The run edition: "morning", "afternoon", or "evening".
    pub edition: String,
    /// When the snapshot was assembled, RFC 3339 in UTC.
    pub generated_at: String,
    /// Keyword-matched articles from the configured feeds.
    pub articles: Vec<Article>,
    /// Environmental-health 311 complaints.
    pub complaints: Vec<Complaint>,
    /// Disease-related DOHMH press releases.
    pub press_releases: Vec<PressRelease>,
    /// Emergency-department respiratory readings.
    pub respiratory: Vec<RespiratoryReading>,
}

impl HarvestSnapshot {
    /// Total number of records across all connectors.
    pub fn record_count(&self) -> usize {
        self.articles.len()
            + self.complaints.len()
            + self.press_releases.len()
            + self.respiratory.len()
    }
}
