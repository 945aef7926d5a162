//! Health keyword matching for article and press release filtering.
//!
//! The matcher does plain case-insensitive substring matching: "rat" matches
//! "Rat sightings" and also "celebration". That is deliberate. Missing a real
//! health story costs more than passing through the occasional false hit, and
//! downstream consumers re-rank anyway.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default health keywords applied when the configuration does not supply its
/// own list.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "health",
    "disease",
    "outbreak",
    "virus",
    "infection",
    "covid",
    "flu",
    "influenza",
    "rsv",
    "measles",
    "legionnaires",
    "legionella",
    "rat",
    "rodent",
    "vermin",
    "pest",
    "sanitation",
    "unsanitary",
    "mold",
    "lead poisoning",
    "air quality",
    "asthma",
    "food poisoning",
    "salmonella",
    "e. coli",
    "norovirus",
    "west nile",
    "mosquito",
    "tick",
    "epidemic",
    "pandemic",
    "quarantine",
    "vaccine",
    "vaccination",
    "hospital",
    "emergency room",
    "public health",
    "health department",
    "hepatitis",
    "tuberculosis",
    "monkeypox",
    "mpox",
];

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Summaries longer than this are cut. Feed descriptions occasionally carry
/// whole article bodies.
const MAX_SUMMARY_CHARS: usize = 1500;

/// Matches text against a fixed keyword list, case-insensitively.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Build a matcher from the given keywords. Keywords are lowercased once
    /// here so each match is a plain substring scan.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        KeywordMatcher { keywords }
    }

    /// Keywords found in the title or summary, in configuration order.
    /// Each keyword appears at most once even when both fields contain it.
    pub fn match_fields(&self, title: &str, summary: Option<&str>) -> Vec<String> {
        let title = title.to_lowercase();
        let summary = summary.map(str::to_lowercase);

        self.keywords
            .iter()
            .filter(|keyword| {
                title.contains(keyword.as_str())
                    || summary
                        .as_deref()
                        .is_some_and(|s| s.contains(keyword.as_str()))
            })
            .cloned()
            .collect()
    }

    /// Whether the title alone contains any keyword.
    pub fn matches_title(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        KeywordMatcher::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

/// Strip markup from a feed description and collapse whitespace.
///
/// Feed descriptions mix plain text, HTML fragments, and CDATA-wrapped HTML.
/// Returns `None` when nothing readable remains.
pub fn clean_summary(raw: &str) -> Option<String> {
    let stripped = TAG_RE.replace_all(raw, " ");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();

    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().count() > MAX_SUMMARY_CHARS {
        let cut: String = trimmed.chars().take(MAX_SUMMARY_CHARS).collect();
        Some(format!("{}…", cut.trim_end()))
    } else {
        Some(trimmed.to_string())
    }
}
