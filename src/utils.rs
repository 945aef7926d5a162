//! Utility functions for edition classification, log formatting, and file
//! system checks.

use chrono::{Local, NaiveTime};
use std::error::Error;
use std::fmt;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// The time-of-day bucket a run belongs to.
///
/// Runs are classified by local wall-clock time:
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Morning,
    Afternoon,
    Evening,
}

impl Edition {
    /// Classify a wall-clock time into an edition.
    pub fn from_time(time: NaiveTime) -> Self {
        let morning_high = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let afternoon_high = NaiveTime::from_hms_opt(16, 0, 0).unwrap();

        if time < morning_high {
            Edition::Morning
        } else if time < afternoon_high {
            Edition::Afternoon
        } else {
            Edition::Evening
        }
    }

    /// The edition for the current local time.
    #[instrument]
    pub fn current() -> Self {
        let tod = Local::now().time();
        let edition = Edition::from_time(tod);
        tracing::debug!(%tod, ?edition, "Computed edition");
        edition
    }

    /// The lowercase name used in file paths and snapshot JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::Morning => "morning",
            Edition::Afternoon => "afternoon",
            Edition::Evening => "evening",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended. Truncation happens on character
/// boundaries, so multi-byte payloads (feed bodies are rarely pure ASCII)
/// never panic.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file. Both output trees are
/// checked this way before any connector runs, so a cron job on a read-only
/// mount fails fast instead of after minutes of fetching.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn edition_boundaries() {
        let at = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();

        assert_eq!(Edition::from_time(at(0, 0, 0)), Edition::Morning);
        assert_eq!(Edition::from_time(at(7, 59, 59)), Edition::Morning);
        assert_eq!(Edition::from_time(at(8, 0, 0)), Edition::Afternoon);
        assert_eq!(Edition::from_time(at(15, 59, 59)), Edition::Afternoon);
        assert_eq!(Edition::from_time(at(16, 0, 0)), Edition::Evening);
        assert_eq!(Edition::from_time(at(23, 59, 59)), Edition::Evening);
    }

    #[test]
    fn edition_names() {
        assert_eq!(Edition::Morning.as_str(), "morning");
        assert_eq!(Edition::Afternoon.as_str(), "afternoon");
        assert_eq!(Edition::Evening.as_str(), "evening");
        assert_eq!(Edition::Evening.to_string(), "evening");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "é".repeat(50);
        let result = truncate_for_log(&s, 10);
        assert!(result.starts_with(&"é".repeat(10)));
        // 40 two-byte chars were dropped
        assert!(result.contains("…(+80 bytes)"));
    }

    #[test]
    fn test_truncate_exact_length_untouched() {
        let s = "abcde";
        assert_eq!(truncate_for_log(s, 5), "abcde");
    }

    #[tokio::test]
    async fn ensure_writable_dir_creates_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let nested = nested.to_str().unwrap();

        ensure_writable_dir(nested).await.unwrap();
        assert!(std::path::Path::new(nested).is_dir());
    }
}
