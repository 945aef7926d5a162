//! # NYC Health Signals
//!
//! A collector for NYC public-health signals. Each run polls local news RSS
//! feeds, the city's 311 open data API, the health department press room,
//! and the published emergency-department respiratory data, then writes one
//! JSON snapshot plus keyed message envelopes for downstream ingestion.
//!
//! ## Features
//!
//! - Polls multiple local news feeds (Gothamist, NY Post Metro, NYT New York)
//!   and keeps only health-keyword matches
//! - Queries 311 for environmental-health complaint types with paging and
//!   retry
//! - Scrapes disease-related DOHMH press releases
//! - Ingests the citywide emergency-department respiratory CSV
//! - Outputs date-partitioned JSON snapshots and pipeline message files
//!
//! ## Usage
//!
//! ```sh
//! nyc_health_signals -j ./json -p ./pipeline
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Collection**: Poll each source independently (a dead source is
//!    logged and skipped, never fatal)
//! 2. **Filtering**: Keep health-relevant records inside each lookback window
//! 3. **Snapshot**: Assemble one dated, edition-stamped snapshot
//! 4. **Output**: Write the JSON snapshot and the pipeline message batch

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod connectors;
mod keywords;
mod models;
mod outputs;
mod retry;
mod utils;

use cli::Cli;
use config::load_config;
use connectors::{feeds, open_data, press, respiratory};
use keywords::KeywordMatcher;
use models::HarvestSnapshot;
use outputs::{json, pipeline};
use utils::{ensure_writable_dir, Edition};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("health_signals starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.pipeline_output_dir, "Parsed CLI arguments");

    // --- Load run configuration ---
    let mut run_config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(path = ?args.config, error = %e, "Failed to load configuration");
            return Err(e);
        }
    };
    if let Some(days) = args.days_back {
        info!(days, "Applying lookback override to every source");
        run_config.apply_days_back(days);
    }

    // Early check: ensure both output dirs are writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    if let Err(e) = ensure_writable_dir(&args.pipeline_output_dir).await {
        error!(
            path = %args.pipeline_output_dir,
            error = %e,
            "Pipeline output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let matcher = KeywordMatcher::new(&run_config.keywords);

    // ---- Collect from every source ----
    let articles = feeds::collect_articles(&run_config.feeds, &matcher).await;
    let complaints =
        open_data::collect_complaints(&run_config.open_data, args.socrata_app_token.as_deref())
            .await;
    let press_releases = press::collect_releases(&run_config.press, &matcher).await;
    let respiratory_readings = respiratory::collect_readings(&run_config.respiratory).await;

    info!(
        articles = articles.len(),
        complaints = complaints.len(),
        press_releases = press_releases.len(),
        respiratory = respiratory_readings.len(),
        "Collection complete"
    );

    // Surface the citywide headline numbers in the run log
    for reading in respiratory::latest_headline_readings(&respiratory_readings) {
        info!(
            metric = %reading.metric,
            value = reading.value,
            date = %reading.date,
            "Latest citywide reading"
        );
    }

    // ---- Build snapshot ----
    let snapshot = HarvestSnapshot {
        local_date: Local::now().date_naive().to_string(),
        edition: Edition::current().as_str().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        articles,
        complaints,
        press_releases,
        respiratory: respiratory_readings,
    };
    info!(
        edition = %snapshot.edition,
        local_date = %snapshot.local_date,
        records = snapshot.record_count(),
        "Snapshot assembled"
    );
    if snapshot.record_count() == 0 {
        // an empty snapshot is still a data point for the consumer
        info!("No health signals collected this run; writing empty outputs");
    }

    // ---- Write outputs ----
    match json::write_snapshot(&snapshot, &args.json_output_dir).await {
        Ok(path) => info!(path = %path.display(), "JSON snapshot written"),
        Err(e) => error!(error = %e, "Failed to write JSON snapshot"),
    }
    match pipeline::write_messages(&snapshot, &args.pipeline_output_dir).await {
        Ok(path) => info!(path = %path.display(), "Pipeline messages written"),
        Err(e) => error!(error = %e, "Failed to write pipeline messages"),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
