//! Run configuration: feed list, keywords, and per-source settings.
//!
//! Configuration is optional. With no file the collector runs against the
//! built-in NYC sources; a YAML file can override any subset of fields and
//! the rest keep their defaults.

use crate::keywords::DEFAULT_KEYWORDS;
use serde::Deserialize;
use std::error::Error;
use tracing::{info, instrument};

/// One RSS feed to poll.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// Human-readable source name carried into each article record.
    pub name: String,
    /// The feed URL.
    pub url: String,
}

/// Settings for the 311 open data connector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenDataConfig {
    /// The dataset resource endpoint (JSON).
    pub base_url: String,
    /// Complaint types to request, exactly as the dataset spells them.
    pub complaint_types: Vec<String>,
    /// Rows per page.
    pub page_size: u32,
    /// Upper bound on pages fetched per run.
    pub max_pages: u32,
    /// How many days of history to request.
    pub days_back: u32,
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        OpenDataConfig {
            base_url: "https://data.cityofnewyork.us/resource/erm2-nwe9.json".to_string(),
            complaint_types: vec![
                "Rodent".to_string(),
                "UNSANITARY CONDITION".to_string(),
                "Food Poisoning".to_string(),
            ],
            page_size: 1000,
            max_pages: 10,
            days_back: 30,
        }
    }
}

/// Settings for the DOHMH press release connector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PressConfig {
    /// The recent-press-releases listing page.
    pub url: String,
    /// Releases older than this many days are skipped.
    pub days_back: u32,
}

impl Default for PressConfig {
    fn default() -> Self {
        PressConfig {
            url: "https://www.nyc.gov/site/doh/about/press/recent-press-releases.page"
                .to_string(),
            days_back: 30,
        }
    }
}

/// Settings for the emergency-department respiratory data connector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RespiratoryConfig {
    /// The published CSV of citywide ED visit data.
    pub csv_url: String,
    /// Readings older than this many days are skipped.
    pub days_back: u32,
    /// Keep only metrics containing this text (e.g. "covid"); `None` keeps all.
    pub metric: Option<String>,
    /// Keep only this submetric (e.g. "Overall"); `None` keeps all.
    pub submetric: Option<String>,
}

impl Default for RespiratoryConfig {
    fn default() -> Self {
        RespiratoryConfig {
            csv_url:
                "https://raw.githubusercontent.com/nychealth/respiratory-illness-data/main/data/emergencyDeptData.csv"
                    .to_string(),
            days_back: 90,
            metric: None,
            submetric: None,
        }
    }
}

/// Everything a run needs to know about its sources.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RSS feeds to poll.
    pub feeds: Vec<FeedConfig>,
    /// Health keywords matched against titles and summaries.
    pub keywords: Vec<String>,
    /// 311 open data settings.
    pub open_data: OpenDataConfig,
    /// DOHMH press room settings.
    pub press: PressConfig,
    /// Respiratory data settings.
    pub respiratory: RespiratoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feeds: vec![
                FeedConfig {
                    name: "Gothamist".to_string(),
                    url: "https://gothamist.com/feed".to_string(),
                },
                FeedConfig {
                    name: "NY Post Metro".to_string(),
                    url: "https://nypost.com/metro/feed/".to_string(),
                },
                FeedConfig {
                    name: "NYT New York".to_string(),
                    url: "https://rss.nytimes.com/services/xml/rss/nyt/NYRegion.xml".to_string(),
                },
            ],
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            open_data: OpenDataConfig::default(),
            press: PressConfig::default(),
            respiratory: RespiratoryConfig::default(),
        }
    }
}

impl Config {
    /// Override every per-source lookback with one value. Used by the
    /// `--days-back` flag.
    pub fn apply_days_back(&mut self, days: u32) {
        self.open_data.days_back = days;
        self.press.days_back = days;
        self.respiratory.days_back = days;
    }
}

/// Load configuration from an optional YAML file.
///
/// With `None` the built-in defaults are used. An explicitly given path that
/// cannot be read or parsed is an error; a run with the wrong sources is
/// worse than no run.
#[instrument(level = "info", skip_all, fields(path = path.unwrap_or("<defaults>")))]
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given, using built-in defaults");
        return Ok(Config::default());
    };

    let raw = std::fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&raw)?;
    info!(
        feeds = config.feeds.len(),
        keywords = config.keywords.len(),
        "Loaded configuration"
    );
    Ok(config)
}
