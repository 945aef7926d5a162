//! NYC DOHMH press room connector.
//!
//! Scrapes the health department's recent-press-releases page. The listing
//! is a run of `<p>` elements, each carrying the release date in a
//! `<strong>` tag and the title as a link, like:
//!
//! ```html
//! <p><strong>August 14, 2026</strong> - <a href="/site/doh/...">Title</a></p>
//! ```
//!
//! Paragraphs that don't fit that shape (contact blurbs, navigation) are
//! skipped. Only releases inside the lookback window whose title matches a
//! health keyword are kept.

use crate::config::PressConfig;
use crate::connectors::http_client;
use crate::keywords::KeywordMatcher;
use crate::models::PressRelease;
use crate::retry::{FetchText, HttpFetcher};
use chrono::{Local, NaiveDate};
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Source name carried on every press release record.
pub const SOURCE_NAME: &str = "NYC DOHMH";

/// Parse the listing's date format, e.g. "August 14, 2026".
fn parse_press_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%B %d, %Y").ok()
}

/// Extract keyword-matching releases from the listing page.
fn releases_from_html(
    page_url: &str,
    body: &str,
    matcher: &KeywordMatcher,
    cutoff: NaiveDate,
) -> Result<Vec<PressRelease>, Box<dyn Error>> {
    let base_url = Url::parse(page_url)?;
    let document = Html::parse_document(body);
    let paragraph_selector = Selector::parse("p")?;
    let date_selector = Selector::parse("strong")?;
    let link_selector = Selector::parse("a[href]")?;

    let mut releases = Vec::new();
    for paragraph in document.select(&paragraph_selector) {
        let Some(date_el) = paragraph.select(&date_selector).next() else {
            continue;
        };
        let date_text: String = date_el.text().collect();
        let Some(published_on) = parse_press_date(&date_text) else {
            continue;
        };
        if published_on < cutoff {
            debug!(%published_on, "Skipping press release older than the window");
            continue;
        }

        let Some(link) = paragraph.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = link
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            continue;
        }

        let matched = matcher.match_fields(&title, None);
        if matched.is_empty() {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            debug!(%href, "Skipping press release with unresolvable link");
            continue;
        };

        releases.push(PressRelease {
            source: SOURCE_NAME.to_string(),
            title,
            published_on,
            url: resolved.to_string(),
            matched_keywords: matched,
        });
    }

    Ok(releases)
}

/// Collect recent disease-related press releases.
///
/// Failures are absorbed: a press room outage costs this run its press
/// section and nothing else.
#[instrument(level = "info", skip_all)]
pub async fn collect_releases(config: &PressConfig, matcher: &KeywordMatcher) -> Vec<PressRelease> {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(config.days_back as i64);

    let fetcher = HttpFetcher::new(http_client());
    let body = match fetcher.fetch_text(&config.url).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, url = %config.url, "Press room fetch failed");
            return Vec::new();
        }
    };

    match releases_from_html(&config.url, &body, matcher, cutoff) {
        Ok(releases) => {
            info!(count = releases.len(), %cutoff, "Collected press releases");
            releases
        }
        Err(e) => {
            error!(error = %e, url = %config.url, "Press room page did not parse");
            Vec::new()
        }
    }
}
