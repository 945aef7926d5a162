//! Output generation modules for snapshot and pipeline message files.
//!
//! This module contains submodules responsible for writing collected records
//! to disk:
//!
//! # Submodules
//!
//! - [`json`]: Writes the full [`crate::models::HarvestSnapshot`] for API consumption
//! - [`pipeline`]: Writes keyed message envelopes for the downstream ingest pipeline
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2026-08-21/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//!
//! pipeline_output_dir/
//! └── 2026-08-21/
//!     ├── morning_messages.json
//!     ├── afternoon_messages.json
//!     └── evening_messages.json
//! ```
//!
//! # Evening Edge Case
//!
//! If an "evening" edition is still writing as the date rolls over, it files
//! under the previous date to stay grouped with the day it covers. Both
//! writers share [`effective_date`] so the snapshot and its messages always
//! land in the same dated directory.

pub mod json;
pub mod pipeline;

use chrono::{Duration, NaiveDate, NaiveTime};

/// The date directory a snapshot files under.
pub(crate) fn effective_date(
    edition: &str,
    local_date: &str,
    now: NaiveTime,
    today: NaiveDate,
) -> String {
    let midnight = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    if edition == "evening" && now >= midnight {
        (today - Duration::days(1)).to_string()
    } else {
        local_date.to_string()
    }
}
