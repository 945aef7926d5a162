//! Keyed message envelopes for the downstream ingest pipeline.
//!
//! Every record in a snapshot becomes one message with a stable key, so the
//! consumer can upsert idempotently across runs:
//!
//! - articles and press releases key on their URL
//! - 311 complaints key on `nyc311_{unique_key}`
//! - respiratory readings key on `nyc_respiratory_{date}_{metric}_{submetric}`
//!
//! Message values carry a `source_type`/`source_name`/`content_type` triple
//! the consumer routes on, then the record fields. The run's message file
//! lands next to its snapshot:
//! `{pipeline_output_dir}/{date}/{edition}_messages.json`.

use crate::models::{Article, Complaint, HarvestSnapshot, PressRelease, RespiratoryReading};
use crate::outputs::effective_date;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// One keyed message bound for the ingest pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMessage {
    /// Stable identity of the record across runs.
    pub key: String,
    /// The routed payload.
    pub value: serde_json::Value,
}

fn article_message(article: &Article, scraped_at: &str) -> PipelineMessage {
    PipelineMessage {
        key: article.url.clone(),
        value: json!({
            "source_type": "local_news_rss",
            "source_name": article.source,
            "content_type": "article",
            "timestamp": article.published_at.map(|t| t.to_rfc3339()),
            "title": article.title,
            "url": article.url,
            "summary": article.summary,
            "matched_keywords": article.matched_keywords,
            "metadata": {"scraped_at": scraped_at},
        }),
    }
}

fn complaint_message(complaint: &Complaint, scraped_at: &str) -> PipelineMessage {
    PipelineMessage {
        key: format!("nyc311_{}", complaint.unique_key),
        value: json!({
            "source_type": "city_service_requests",
            "source_name": "nyc_311",
            "content_type": "service_request",
            "timestamp": complaint
                .created_at
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            "complaint_type": complaint.complaint_type,
            "descriptor": complaint.descriptor,
            "borough": complaint.borough,
            "location": complaint.location,
            "status": complaint.status,
            "metadata": {"scraped_at": scraped_at},
        }),
    }
}

fn press_message(release: &PressRelease, scraped_at: &str) -> PipelineMessage {
    PipelineMessage {
        key: release.url.clone(),
        value: json!({
            "source_type": "official_health_dept",
            "source_name": "nyc_doh",
            "content_type": "press_release",
            "timestamp": release.published_on.to_string(),
            "title": release.title,
            "url": release.url,
            // listing page only; release bodies are not fetched
            "full_text": null,
            "matched_keywords": release.matched_keywords,
            "metadata": {"scraped_at": scraped_at},
        }),
    }
}

fn respiratory_message(reading: &RespiratoryReading, scraped_at: &str) -> PipelineMessage {
    PipelineMessage {
        key: format!(
            "nyc_respiratory_{}_{}_{}",
            reading.date, reading.metric, reading.submetric
        ),
        value: json!({
            "source_type": "official_health_data",
            "source_name": "nyc_github_respiratory",
            "content_type": "health_metric",
            "date": reading.date.to_string(),
            "metric": reading.metric,
            "submetric": reading.submetric,
            "value": reading.value,
            "display": reading.display,
            "scraped_at": scraped_at,
        }),
    }
}

/// Build the message batch for a snapshot, section by section.
pub fn snapshot_messages(snapshot: &HarvestSnapshot) -> Vec<PipelineMessage> {
    let scraped_at = snapshot.generated_at.as_str();
    let mut messages = Vec::with_capacity(snapshot.record_count());
    messages.extend(
        snapshot
            .articles
            .iter()
            .map(|article| article_message(article, scraped_at)),
    );
    messages.extend(
        snapshot
            .complaints
            .iter()
            .map(|complaint| complaint_message(complaint, scraped_at)),
    );
    messages.extend(
        snapshot
            .press_releases
            .iter()
            .map(|release| press_message(release, scraped_at)),
    );
    messages.extend(
        snapshot
            .respiratory
            .iter()
            .map(|reading| respiratory_message(reading, scraped_at)),
    );
    messages
}

/// Write a snapshot's message batch next to its JSON snapshot.
///
/// # Output Path
///
/// The file is written to:
/// `{pipeline_output_dir}/{date}/{edition}_messages.json`
#[instrument(level = "info", skip_all, fields(pipeline_output_dir = %pipeline_output_dir))]
pub async fn write_messages(
    snapshot: &HarvestSnapshot,
    pipeline_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let messages = snapshot_messages(snapshot);
    let json = serde_json::to_string(&messages)?;

    let date = effective_date(
        &snapshot.edition,
        &snapshot.local_date,
        Local::now().time(),
        Local::now().date_naive(),
    );
    let full_dir = format!("{}/{}", pipeline_output_dir, date);

    info!(%full_dir, "Ensuring pipeline directory exists");
    if let Err(e) = fs::create_dir_all(&full_dir).await {
        error!(%full_dir, error = %e, "Failed to create pipeline dir");
        return Err(e.into());
    }

    let path = format!("{}/{}_messages.json", full_dir, snapshot.edition);
    info!(%path, count = messages.len(), "Writing pipeline messages");
    fs::write(&path, json).await?;
    info!(%path, "Wrote pipeline messages");

    Ok(PathBuf::from(path))
}
