//! Emergency-department respiratory illness data connector.
//!
//! Downloads the health department's published CSV of citywide emergency
//! department visit shares and turns each row into a [`RespiratoryReading`].
//! Rows are keyed by (metric, submetric): the metric names the series
//! ("COVID-19 visits") and the submetric names the breakdown ("Overall", a
//! borough, an age band).
//!
//! The file is small, a few thousand rows of
//! `date,metric,submetric,value,display`, and is parsed line by line with a
//! quote-aware splitter. Unparseable rows are counted and skipped; the
//! published file occasionally carries blank or partial lines.

use crate::config::RespiratoryConfig;
use crate::connectors::http_client;
use crate::models::RespiratoryReading;
use crate::retry::{FetchText, HttpFetcher};
use crate::utils::truncate_for_log;
use chrono::{Local, NaiveDate};
use itertools::{Itertools, MinMaxResult};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

/// The series surfaced in run logs as the citywide headline numbers.
pub const HEADLINE_METRICS: &[&str] = &[
    "COVID-19 visits",
    "Influenza visits",
    "RSV visits",
    "Respiratory illness visits",
];

/// Split one CSV line into fields, honoring double-quoted fields and `""`
/// escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Column positions resolved from the header line, case-insensitively.
struct Columns {
    date: usize,
    metric: usize,
    submetric: usize,
    value: usize,
    display: Option<usize>,
}

fn header_columns(header: &str) -> Option<Columns> {
    let names: Vec<String> = split_csv_line(header)
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    let position = |name: &str| names.iter().position(|c| c == name);

    Some(Columns {
        date: position("date")?,
        metric: position("metric")?,
        submetric: position("submetric")?,
        value: position("value")?,
        display: position("display"),
    })
}

fn parse_reading_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

fn reading_from_fields(fields: &[String], columns: &Columns) -> Option<RespiratoryReading> {
    let date = parse_reading_date(fields.get(columns.date)?)?;
    let metric = fields.get(columns.metric)?.trim();
    if metric.is_empty() {
        return None;
    }
    let submetric = fields.get(columns.submetric)?.trim();
    let value: f64 = fields.get(columns.value)?.trim().parse().ok()?;
    let display = columns
        .display
        .and_then(|i| fields.get(i))
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Some(RespiratoryReading {
        date,
        metric: metric.to_string(),
        // citywide rows sometimes leave the breakdown blank
        submetric: if submetric.is_empty() {
            "Overall".to_string()
        } else {
            submetric.to_string()
        },
        value,
        display,
    })
}

/// Parse the whole CSV body. Rows that don't yield a reading are counted
/// and skipped.
fn readings_from_csv(body: &str) -> Vec<RespiratoryReading> {
    let mut lines = body.lines().map(|line| line.trim_end_matches('\r'));
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let Some(columns) = header_columns(header) else {
        warn!(
            header = %truncate_for_log(header, 200),
            "Respiratory CSV header missing expected columns"
        );
        return Vec::new();
    };

    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        match reading_from_fields(&fields, &columns) {
            Some(reading) => readings.push(reading),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = readings.len(), "Skipped unparseable respiratory rows");
    }
    readings
}

/// Apply the lookback window and optional metric/submetric narrowing.
///
/// The metric filter is a case-insensitive substring match, so `covid`
/// selects "COVID-19 visits". The submetric filter is an exact
/// (case-insensitive) name.
fn filter_readings(
    readings: Vec<RespiratoryReading>,
    config: &RespiratoryConfig,
    cutoff: NaiveDate,
) -> Vec<RespiratoryReading> {
    readings
        .into_iter()
        .filter(|r| r.date >= cutoff)
        .filter(|r| {
            config
                .metric
                .as_deref()
                .is_none_or(|m| r.metric.to_lowercase().contains(&m.to_lowercase()))
        })
        .filter(|r| {
            config
                .submetric
                .as_deref()
                .is_none_or(|s| r.submetric.eq_ignore_ascii_case(s))
        })
        .collect()
}

/// The most recent reading of each (metric, submetric) series, ordered by
/// series name.
pub fn latest_readings(readings: &[RespiratoryReading]) -> Vec<RespiratoryReading> {
    let mut latest: BTreeMap<(String, String), &RespiratoryReading> = BTreeMap::new();
    for reading in readings {
        latest
            .entry((reading.metric.clone(), reading.submetric.clone()))
            .and_modify(|current| {
                if reading.date > current.date {
                    *current = reading;
                }
            })
            .or_insert(reading);
    }
    latest.into_values().cloned().collect()
}

/// The most recent citywide value of each headline series.
pub fn latest_headline_readings(readings: &[RespiratoryReading]) -> Vec<RespiratoryReading> {
    latest_readings(readings)
        .into_iter()
        .filter(|r| r.submetric.eq_ignore_ascii_case("Overall"))
        .filter(|r| HEADLINE_METRICS.iter().any(|m| r.metric.eq_ignore_ascii_case(m)))
        .collect()
}

/// Collect respiratory readings inside the configured window.
///
/// Failures are absorbed: if the CSV is unreachable this run simply carries
/// no respiratory section.
#[instrument(level = "info", skip_all)]
pub async fn collect_readings(config: &RespiratoryConfig) -> Vec<RespiratoryReading> {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(config.days_back as i64);

    let fetcher = HttpFetcher::new(http_client());
    let body = match fetcher.fetch_text(&config.csv_url).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, url = %config.csv_url, "Respiratory data fetch failed");
            return Vec::new();
        }
    };

    let readings = filter_readings(readings_from_csv(&body), config, cutoff);

    match readings.iter().map(|r| r.date).minmax() {
        MinMaxResult::NoElements => info!(count = 0, %cutoff, "No respiratory readings in window"),
        MinMaxResult::OneElement(only) => {
            info!(count = readings.len(), first = %only, last = %only, "Collected respiratory readings")
        }
        MinMaxResult::MinMax(first, last) => {
            info!(count = readings.len(), %first, %last, "Collected respiratory readings")
        }
    }
    readings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
date,metric,submetric,value,display
2026-08-01,COVID-19 visits,Overall,2.1,2.1%
2026-08-08,COVID-19 visits,Overall,2.4,2.4%
2026-08-08,COVID-19 visits,Bronx,3.0,3.0%
2026-08-08,Influenza visits,Overall,0.6,0.6%
2026-08-08,Respiratory illness visits,Overall,4.9,4.9%
not-a-date,COVID-19 visits,Overall,1.0,1%
2026-08-08,RSV visits,Overall,n/a,
";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn splits_plain_fields() {
        assert_eq!(
            split_csv_line("2026-08-08,COVID-19 visits,Overall,2.4,2.4%"),
            vec!["2026-08-08", "COVID-19 visits", "Overall", "2.4", "2.4%"]
        );
    }

    #[test]
    fn splits_quoted_fields_with_commas_and_escapes() {
        assert_eq!(
            split_csv_line(r#"a,"b, with comma","he said ""hi""",d"#),
            vec!["a", "b, with comma", r#"he said "hi""#, "d"]
        );
    }

    #[test]
    fn keeps_empty_fields() {
        assert_eq!(split_csv_line("a,,c,"), vec!["a", "", "c", ""]);
    }

    #[test]
    fn parses_rows_and_skips_bad_ones() {
        let readings = readings_from_csv(SAMPLE_CSV);
        // the not-a-date and n/a rows fall out
        assert_eq!(readings.len(), 5);
        assert_eq!(readings[0].metric, "COVID-19 visits");
        assert_eq!(readings[0].value, 2.1);
        assert_eq!(readings[0].display.as_deref(), Some("2.1%"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let body = "Date,Metric,Submetric,Value,Display\r\n2026-08-08,RSV visits,Overall,0.3,0.3%\r\n";
        let readings = readings_from_csv(body);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].date, date(2026, 8, 8));
    }

    #[test]
    fn missing_required_column_yields_nothing() {
        let body = "date,metric,value\n2026-08-08,RSV visits,0.3\n";
        assert!(readings_from_csv(body).is_empty());
    }

    #[test]
    fn slash_dates_parse_too() {
        assert_eq!(parse_reading_date("08/08/2026"), Some(date(2026, 8, 8)));
        assert_eq!(parse_reading_date("2026-08-08"), Some(date(2026, 8, 8)));
        assert_eq!(parse_reading_date("Aug 8"), None);
    }

    #[test]
    fn blank_submetric_becomes_overall() {
        let body = "date,metric,submetric,value\n2026-08-08,COVID-19 visits,,2.4\n";
        let readings = readings_from_csv(body);
        assert_eq!(readings[0].submetric, "Overall");
        assert_eq!(readings[0].display, None);
    }

    #[test]
    fn window_and_metric_filters_apply() {
        let readings = readings_from_csv(SAMPLE_CSV);

        let mut config = RespiratoryConfig::default();
        config.metric = Some("covid".to_string());
        config.submetric = Some("Overall".to_string());

        let filtered = filter_readings(readings, &config, date(2026, 8, 5));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].date, date(2026, 8, 8));
        assert_eq!(filtered[0].value, 2.4);
    }

    #[test]
    fn latest_keeps_newest_per_series() {
        let readings = readings_from_csv(SAMPLE_CSV);
        let latest = latest_readings(&readings);

        let covid_overall = latest
            .iter()
            .find(|r| r.metric == "COVID-19 visits" && r.submetric == "Overall")
            .unwrap();
        assert_eq!(covid_overall.date, date(2026, 8, 8));
        assert_eq!(covid_overall.value, 2.4);

        // one entry per (metric, submetric) pair, in series order
        assert_eq!(latest.len(), 4);
        assert_eq!(latest[0].submetric, "Bronx");
    }

    #[test]
    fn headline_readings_are_citywide_only() {
        let readings = readings_from_csv(SAMPLE_CSV);
        let headline = latest_headline_readings(&readings);

        let metrics: Vec<&str> = headline.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(
            metrics,
            vec!["COVID-19 visits", "Influenza visits", "Respiratory illness visits"]
        );
        assert!(headline.iter().all(|r| r.submetric == "Overall"));
    }
}
