//! Local news RSS feed connector.
//!
//! Polls the configured feeds (Gothamist, NY Post Metro, and the New York
//! Times New York section by default), keeps items whose title or summary
//! mentions a health keyword, and normalizes them into [`Article`] records.
//!
//! # Feed Format
//!
//! All three default sources publish RSS 2.0. Descriptions arrive as plain
//! text, HTML fragments, or CDATA-wrapped HTML depending on the outlet, so
//! summaries are stripped and collapsed before matching.

use crate::config::FeedConfig;
use crate::connectors::http_client;
use crate::keywords::{clean_summary, KeywordMatcher};
use crate::models::Article;
use crate::retry::{FetchText, HttpFetcher};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Parse a feed timestamp into UTC.
///
/// RSS 2.0 prescribes RFC 2822 dates and all three default sources use them,
/// but the occasional feed emits RFC 3339. An unparseable date is not worth
/// dropping the item over; the article just carries no timestamp.
fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    None
}

/// Parse one feed body and keep the keyword-matching items.
///
/// Items without a link or title are skipped; they cannot be deduplicated or
/// displayed. Items that match no keyword are skipped quietly since most feed
/// content is not health news.
fn articles_from_feed(
    feed: &FeedConfig,
    body: &str,
    matcher: &KeywordMatcher,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let rss: Rss = quick_xml::de::from_str(body)?;

    let mut articles = Vec::new();
    for item in rss.channel.items {
        let Some(link) = item.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) else {
            debug!(source = %feed.name, "Skipping feed item without a link");
            continue;
        };
        let Some(title) = item.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            debug!(source = %feed.name, url = %link, "Skipping feed item without a title");
            continue;
        };

        let summary = item.description.as_deref().and_then(clean_summary);
        let matched = matcher.match_fields(title, summary.as_deref());
        if matched.is_empty() {
            continue;
        }

        articles.push(Article {
            source: feed.name.clone(),
            title: title.to_string(),
            published_at: item.pub_date.as_deref().and_then(parse_pub_date),
            url: link.to_string(),
            summary,
            matched_keywords: matched,
        });
    }

    Ok(articles)
}

/// Fetch one feed and return its keyword-matching articles.
///
/// # Errors
///
/// Returns an error if the feed cannot be fetched or its body does not parse
/// as RSS. Callers isolate the failure; see [`collect_articles`].
#[instrument(level = "info", skip_all, fields(source = %feed.name))]
pub async fn fetch_feed(
    feed: &FeedConfig,
    matcher: &KeywordMatcher,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let fetcher = HttpFetcher::new(http_client());
    let body = fetcher.fetch_text(&feed.url).await?;

    let articles = match articles_from_feed(feed, &body, matcher) {
        Ok(articles) => articles,
        Err(e) => {
            warn!(
                error = %e,
                url = %feed.url,
                body = %truncate_for_log(&body, 300),
                "Feed body did not parse as RSS"
            );
            return Err(e);
        }
    };

    info!(
        count = articles.len(),
        url = %feed.url,
        "Collected matching articles from feed"
    );
    Ok(articles)
}

/// Drop repeated URLs, keeping the first occurrence.
///
/// The same story sometimes appears in more than one configured feed; feed
/// order in the configuration decides which source record survives.
fn dedupe_by_url(articles: Vec<Article>) -> Vec<Article> {
    let total = articles.len();
    let articles: Vec<Article> = articles
        .into_iter()
        .unique_by(|article| article.url.clone())
        .collect();
    if articles.len() < total {
        debug!(
            removed = total - articles.len(),
            "Dropped duplicate article URLs"
        );
    }
    articles
}

/// Collect matching articles from every configured feed.
///
/// Feeds are polled sequentially and failures are isolated: a feed that is
/// down or serving garbage is logged and skipped while the others still
/// contribute their articles.
#[instrument(level = "info", skip_all)]
pub async fn collect_articles(feeds: &[FeedConfig], matcher: &KeywordMatcher) -> Vec<Article> {
    let articles: Vec<Article> = stream::iter(feeds)
        .then(|feed| async move {
            match fetch_feed(feed, matcher).await {
                Ok(articles) => articles,
                Err(e) => {
                    error!(
                        error = %e,
                        source = %feed.name,
                        url = %feed.url,
                        "Feed collection failed; continuing with remaining feeds"
                    );
                    Vec::new()
                }
            }
        })
        .concat()
        .await;

    let articles = dedupe_by_url(articles);
    info!(
        count = articles.len(),
        feeds = feeds.len(),
        "Collected articles across feeds"
    );
    articles
}
