//! NYC 311 environmental-health complaint connector.
//!
//! Queries the city's service request dataset for a fixed set of
//! environmental-health complaint types (rodents, unsanitary conditions,
//! food poisoning by default) created inside the lookback window, and
//! normalizes the rows into [`Complaint`] records.
//!
//! # API Shape
//!
//! The dataset speaks the Socrata query dialect: a `$where` clause selects
//! complaint types and the date window, `$order` keeps results newest-first,
//! and `$limit`/`$offset` page through them. Every field in a row arrives as
//! a JSON string, coordinates included. An app token is optional but lifts
//! the anonymous rate limit, so requests are retried with backoff when the
//! API throttles or errors server-side.

use crate::config::OpenDataConfig;
use crate::connectors::http_client;
use crate::models::{Complaint, Location};
use crate::retry::{fetch_text_with_backoff, HttpFetcher};
use crate::utils::truncate_for_log;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

/// One row of the service request dataset, as served.
#[derive(Debug, Deserialize)]
struct RawServiceRequest {
    unique_key: Option<String>,
    complaint_type: Option<String>,
    descriptor: Option<String>,
    borough: Option<String>,
    created_date: Option<String>,
    incident_address: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    status: Option<String>,
}

/// Build the `$where` clause selecting target complaint types after the
/// cutoff. Single quotes inside a type name are doubled, which is how the
/// query dialect escapes them.
fn soql_where(complaint_types: &[String], cutoff: &str) -> String {
    let quoted: Vec<String> = complaint_types
        .iter()
        .map(|t| format!("'{}'", t.replace('\'', "''")))
        .collect();
    format!(
        "complaint_type in({}) AND created_date >= '{}'",
        quoted.join(","),
        cutoff
    )
}

/// The full request URL for one page.
fn page_url(config: &OpenDataConfig, cutoff: &str, offset: u32) -> String {
    let where_clause = soql_where(&config.complaint_types, cutoff);
    format!(
        "{}?$where={}&$order=created_date%20DESC&$limit={}&$offset={}",
        config.base_url,
        urlencoding::encode(&where_clause),
        config.page_size,
        offset
    )
}

/// The dataset's "floating" timestamp format, local NYC time with no offset.
fn cutoff_timestamp(now: NaiveDateTime, days_back: u32) -> String {
    (now - chrono::Duration::days(days_back as i64))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

fn parse_created_date(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Whether a row's complaint type is one we asked for, ignoring case.
/// The API already filters server-side; this guards the output against
/// dataset spelling drift.
fn is_target_type(complaint_type: &str, targets: &[String]) -> bool {
    targets
        .iter()
        .any(|t| t.eq_ignore_ascii_case(complaint_type))
}

/// Convert one raw row into a [`Complaint`].
///
/// Rows without a unique key or complaint type are unusable and dropped.
/// Everything else degrades field by field: a bad coordinate or timestamp
/// costs that field, not the record.
fn complaint_from_row(row: RawServiceRequest) -> Option<Complaint> {
    let (Some(unique_key), Some(complaint_type)) = (row.unique_key, row.complaint_type) else {
        return None;
    };

    let created_at = row.created_date.as_deref().and_then(parse_created_date);
    let latitude = row.latitude.as_deref().and_then(|v| v.parse::<f64>().ok());
    let longitude = row.longitude.as_deref().and_then(|v| v.parse::<f64>().ok());
    let location = Location::from_parts(row.incident_address, latitude, longitude);

    Some(Complaint {
        unique_key,
        complaint_type,
        descriptor: row.descriptor,
        borough: row.borough,
        created_at,
        location,
        status: row.status,
    })
}

/// Convert a page of raw rows, dropping unusable and off-target ones.
fn complaints_from_rows(rows: Vec<RawServiceRequest>, targets: &[String]) -> Vec<Complaint> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(complaint) = complaint_from_row(row) else {
                debug!("Skipping 311 row without unique_key or complaint_type");
                return None;
            };
            if !is_target_type(&complaint.complaint_type, targets) {
                debug!(
                    complaint_type = %complaint.complaint_type,
                    "Skipping off-target complaint type"
                );
                return None;
            }
            Some(complaint)
        })
        .collect()
}

/// Collect recent environmental-health complaints from the 311 dataset.
///
/// Pages through the dataset until a short page, the page limit, or an
/// error. Errors keep whatever was already collected: a partial complaint
/// list is still a usable snapshot, and the next scheduled run covers the
/// gap since windows overlap.
#[instrument(level = "info", skip_all)]
pub async fn collect_complaints(config: &OpenDataConfig, app_token: Option<&str>) -> Vec<Complaint> {
    let cutoff = cutoff_timestamp(Local::now().naive_local(), config.days_back);

    let mut fetcher = HttpFetcher::new(http_client());
    if let Some(token) = app_token {
        fetcher = fetcher.with_header("X-App-Token", token);
    }

    let mut complaints: Vec<Complaint> = Vec::new();
    let mut offset = 0u32;

    for page in 0..config.max_pages {
        let url = page_url(config, &cutoff, offset);
        let body = match fetch_text_with_backoff(fetcher.clone(), &url).await {
            Ok(body) => body,
            Err(e) => {
                error!(
                    error = %e,
                    page,
                    offset,
                    "311 page fetch failed; keeping partial results"
                );
                break;
            }
        };

        let rows: Vec<RawServiceRequest> = match serde_json::from_str(&body) {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    error = %e,
                    page,
                    body = %truncate_for_log(&body, 300),
                    "311 page did not parse; keeping partial results"
                );
                break;
            }
        };

        let fetched = rows.len();
        let page_complaints = complaints_from_rows(rows, &config.complaint_types);
        debug!(page, fetched, kept = page_complaints.len(), "Processed 311 page");
        complaints.extend(page_complaints);

        if (fetched as u32) < config.page_size {
            break;
        }
        if page + 1 == config.max_pages {
            warn!(
                max_pages = config.max_pages,
                "Reached page limit with a full page; older rows left behind"
            );
        }
        offset += config.page_size;
    }

    info!(count = complaints.len(), %cutoff, "Collected 311 complaints");
    complaints
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> OpenDataConfig {
        OpenDataConfig::default()
    }

    #[test]
    fn where_clause_quotes_and_joins_types() {
        let clause = soql_where(
            &["Rodent".to_string(), "Food Poisoning".to_string()],
            "2026-07-22T00:00:00",
        );
        assert_eq!(
            clause,
            "complaint_type in('Rodent','Food Poisoning') AND created_date >= '2026-07-22T00:00:00'"
        );
    }

    #[test]
    fn where_clause_doubles_embedded_quotes() {
        let clause = soql_where(&["Rat's Nest".to_string()], "2026-07-22T00:00:00");
        assert!(clause.contains("'Rat''s Nest'"));
    }

    #[test]
    fn page_url_encodes_the_where_clause() {
        let url = page_url(&config(), "2026-07-22T00:00:00", 2000);

        assert!(url.starts_with("https://data.cityofnewyork.us/resource/erm2-nwe9.json?$where="));
        assert!(url.contains("complaint_type%20in%28%27Rodent%27%2C%27UNSANITARY%20CONDITION%27"));
        assert!(url.contains("created_date%20%3E%3D%20%272026-07-22T00%3A00%3A00%27"));
        assert!(url.contains("$order=created_date%20DESC"));
        assert!(url.contains("$limit=1000"));
        assert!(url.contains("$offset=2000"));
    }

    #[test]
    fn cutoff_counts_back_whole_days() {
        let now = NaiveDate::from_ymd_opt(2026, 8, 21)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(cutoff_timestamp(now, 30), "2026-07-22T14:05:09");
    }

    #[test]
    fn created_date_parses_with_and_without_millis() {
        assert!(parse_created_date("2026-08-14T09:30:00.000").is_some());
        assert!(parse_created_date("2026-08-14T09:30:00").is_some());
        assert!(parse_created_date("08/14/2026 09:30").is_none());
    }

    #[test]
    fn target_type_check_ignores_case() {
        let targets = vec!["Rodent".to_string(), "UNSANITARY CONDITION".to_string()];
        assert!(is_target_type("RODENT", &targets));
        assert!(is_target_type("Unsanitary Condition", &targets));
        assert!(!is_target_type("Noise - Residential", &targets));
    }

    #[test]
    fn row_conversion_parses_strings() {
        let row: RawServiceRequest = serde_json::from_str(
            r#"{
                "unique_key": "61234567",
                "complaint_type": "Rodent",
                "descriptor": "Rat Sighting",
                "borough": "QUEENS",
                "created_date": "2026-08-14T09:30:00.000",
                "incident_address": "41-20 MAIN STREET",
                "latitude": "40.7590",
                "longitude": "-73.8300",
                "status": "Open"
            }"#,
        )
        .unwrap();

        let complaint = complaint_from_row(row).unwrap();
        assert_eq!(complaint.unique_key, "61234567");
        assert_eq!(
            complaint.created_at,
            NaiveDate::from_ymd_opt(2026, 8, 14)
                .unwrap()
                .and_hms_opt(9, 30, 0)
        );
        // address wins over the coordinate pair
        assert_eq!(
            complaint.location,
            Some(Location::Address("41-20 MAIN STREET".to_string()))
        );
    }

    #[test]
    fn row_without_key_is_dropped() {
        let row: RawServiceRequest =
            serde_json::from_str(r#"{"complaint_type": "Rodent"}"#).unwrap();
        assert!(complaint_from_row(row).is_none());
    }

    #[test]
    fn off_target_rows_are_filtered_out() {
        let rows: Vec<RawServiceRequest> = serde_json::from_str(
            r#"[
                {"unique_key": "1", "complaint_type": "Rodent"},
                {"unique_key": "2", "complaint_type": "Noise - Residential"},
                {"unique_key": "3", "complaint_type": "food poisoning"}
            ]"#,
        )
        .unwrap();

        let complaints = complaints_from_rows(rows, &config().complaint_types);
        let keys: Vec<&str> = complaints.iter().map(|c| c.unique_key.as_str()).collect();
        assert_eq!(keys, vec!["1", "3"]);
    }

    mod server {
        use super::*;
        use axum::extract::Query;
        use axum::http::{HeaderMap, StatusCode};
        use axum::response::IntoResponse;
        use axum::routing::get;
        use axum::Router;
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        const PAGE_ONE: &str = r#"[
            {"unique_key": "1", "complaint_type": "Rodent"},
            {"unique_key": "2", "complaint_type": "UNSANITARY CONDITION"}
        ]"#;
        const PAGE_TWO: &str = r#"[
            {"unique_key": "3", "complaint_type": "Food Poisoning"}
        ]"#;

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}/rows")
        }

        #[tokio::test]
        async fn pages_until_a_short_page() {
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_route = hits.clone();

            let app = Router::new().route(
                "/rows",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let hits = hits_route.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        let offset: u32 = params
                            .get("$offset")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        if offset == 0 { PAGE_ONE } else { PAGE_TWO }
                    }
                }),
            );

            let mut config = config();
            config.base_url = serve(app).await;
            config.page_size = 2;
            config.max_pages = 5;

            let complaints = collect_complaints(&config, None).await;

            assert_eq!(complaints.len(), 3);
            // second page was short, so no third request went out
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn page_cap_stops_even_while_pages_run_full() {
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_route = hits.clone();

            let app = Router::new().route(
                "/rows",
                get(move || {
                    let hits = hits_route.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        PAGE_ONE
                    }
                }),
            );

            let mut config = config();
            config.base_url = serve(app).await;
            config.page_size = 2;
            config.max_pages = 2;

            let complaints = collect_complaints(&config, None).await;

            assert_eq!(complaints.len(), 4);
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn app_token_travels_as_a_header() {
            let app = Router::new().route(
                "/rows",
                get(|headers: HeaderMap| async move {
                    match headers.get("X-App-Token").and_then(|v| v.to_str().ok()) {
                        Some("token123") => PAGE_TWO.into_response(),
                        _ => StatusCode::FORBIDDEN.into_response(),
                    }
                }),
            );

            let mut config = config();
            config.base_url = serve(app).await;

            let complaints = collect_complaints(&config, Some("token123")).await;
            assert_eq!(complaints.len(), 1);
            assert_eq!(complaints[0].unique_key, "3");
        }

        #[tokio::test]
        async fn throttled_request_is_retried() {
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_route = hits.clone();

            let app = Router::new().route(
                "/rows",
                get(move || {
                    let hits = hits_route.clone();
                    async move {
                        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                            StatusCode::TOO_MANY_REQUESTS.into_response()
                        } else {
                            PAGE_TWO.into_response()
                        }
                    }
                }),
            );

            let mut config = config();
            config.base_url = serve(app).await;

            let complaints = collect_complaints(&config, None).await;
            assert_eq!(complaints.len(), 1);
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }
    }
}
