//! JSON snapshot output for API consumption.
//!
//! Serializes the [`HarvestSnapshot`] of a run to a date-partitioned file:
//! ```text
//! json_output_dir/
//! └── 2026-08-21/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```
//!
//! A rerun of the same edition overwrites its file; each edition file is the
//! latest complete picture for that slot.

use crate::models::HarvestSnapshot;
use crate::outputs::effective_date;
use chrono::Local;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`HarvestSnapshot`] to a JSON file with date-based directory
/// structure.
///
/// # Returns
///
/// The path of the written file, or an error if directory creation,
/// serialization, or the write fails.
///
/// # Output Path
///
/// The file is written to: `{json_output_dir}/{date}/{edition}.json`
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_snapshot(
    snapshot: &HarvestSnapshot,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string(snapshot)?;

    let date = effective_date(
        &snapshot.edition,
        &snapshot.local_date,
        Local::now().time(),
        Local::now().date_naive(),
    );
    let full_json_dir = format!("{}/{}", json_output_dir, date);

    info!(%full_json_dir, "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(%full_json_dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = format!("{}/{}.json", full_json_dir, snapshot.edition);
    info!(%path, records = snapshot.record_count(), "Writing JSON snapshot");
    fs::write(&path, json).await?;
    info!(%path, "Wrote JSON snapshot");

    Ok(PathBuf::from(path))
}
