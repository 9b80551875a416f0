//! Web-traffic adapter for the Google Analytics Data API (GA4).
//!
//! One `batchRunReports` call carries every report the dashboard needs, so a
//! report request costs a single upstream round trip plus the token exchange.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use estatelytics_core::config::WebTrafficConfig;
use estatelytics_core::error::ProviderError;
use estatelytics_core::provider::{translate, zero_fill, AnalyticsProvider, Translation};
use estatelytics_core::report::{BreakdownRow, MetricMap, MetricPoint, ProviderResult, WEB_TRAFFIC};
use estatelytics_core::window::TimeWindow;

use super::google_auth::TokenSource;
use super::http::{decode_json, send_with_retry, RetryPolicy};

/// GA4 metric name → common metric name.
pub const WEB_TRANSLATION: Translation = &[
    ("screenPageViews", "views"),
    ("activeUsers", "visitors"),
    ("sessions", "sessions"),
    ("newUsers", "new_visitors"),
    ("bounceRate", "bounce_rate"),
    ("averageSessionDuration", "avg_session_duration"),
];

const SERIES_METRICS: [&str; 4] = ["screenPageViews", "activeUsers", "sessions", "newUsers"];
const TOTAL_METRICS: [&str; 6] = [
    "screenPageViews",
    "activeUsers",
    "sessions",
    "newUsers",
    "bounceRate",
    "averageSessionDuration",
];
const BREAKDOWN_LIMIT: u32 = 10;

/// `(breakdown name, GA dimension, GA metric)`, in request order after the
/// series and totals reports.
const BREAKDOWNS: [(&str, &str, &str); 3] = [
    ("top_pages", "pagePath", "screenPageViews"),
    ("traffic_sources", "sessionDefaultChannelGroup", "sessions"),
    ("devices", "deviceCategory", "activeUsers"),
];

const CURRENT_RANGE: &str = "current";
const PREVIOUS_RANGE: &str = "previous";

#[derive(Debug, Deserialize)]
struct BatchRunReportsResponse {
    #[serde(default)]
    reports: Vec<RunReportResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<HeaderName>,
    #[serde(default)]
    metric_headers: Vec<HeaderName>,
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct HeaderName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<CellValue>,
    #[serde(default)]
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    #[serde(default)]
    value: String,
}

pub struct WebTrafficProvider {
    client: Client,
    config: WebTrafficConfig,
    retry: RetryPolicy,
}

impl WebTrafficProvider {
    pub fn new(client: Client, config: WebTrafficConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    fn endpoint(&self) -> Result<url::Url, ProviderError> {
        let property = self
            .config
            .property_id
            .as_deref()
            .ok_or_else(|| ProviderError::Unconfigured("property id missing".to_string()))?;
        let property = property.trim_start_matches("properties/");
        let raw = format!(
            "{}/properties/{}:batchRunReports",
            self.config.api_base.trim_end_matches('/'),
            property
        );
        url::Url::parse(&raw)
            .map_err(|e| ProviderError::Unconfigured(format!("invalid GA API base: {e}")))
    }

    async fn try_fetch(&self, window: &TimeWindow) -> Result<ProviderResult, ProviderError> {
        if !self.config.is_configured() {
            return Err(ProviderError::Unconfigured(
                "ESTATELYTICS_GA_PROPERTY_ID and credentials are required".to_string(),
            ));
        }
        let endpoint = self.endpoint()?;
        let tokens = TokenSource::from_config(
            self.config.access_token.as_deref(),
            self.config.credentials_json.as_deref(),
        )?;
        let token = tokens.access_token(&self.client, self.retry).await?;

        let body = batch_request_body(window);
        let resp = send_with_retry(WEB_TRAFFIC, self.retry, || {
            self.client
                .post(endpoint.clone())
                .bearer_auth(&token)
                .json(&body)
        })
        .await?;
        let batch: BatchRunReportsResponse = decode_json(WEB_TRAFFIC, resp).await?;
        parse_batch(window, batch)
    }
}

#[async_trait]
impl AnalyticsProvider for WebTrafficProvider {
    fn provider_id(&self) -> &'static str {
        WEB_TRAFFIC
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn fetch(&self, window: &TimeWindow) -> ProviderResult {
        super::into_result(WEB_TRAFFIC, self.try_fetch(window).await)
    }
}

fn date_range(window: &TimeWindow, name: &str) -> Value {
    json!({
        "startDate": window.first_day().format("%Y-%m-%d").to_string(),
        "endDate": window.end.format("%Y-%m-%d").to_string(),
        "name": name,
    })
}

fn metrics(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|name| json!({ "name": name })).collect())
}

fn batch_request_body(window: &TimeWindow) -> Value {
    let current = date_range(window, CURRENT_RANGE);
    let previous = date_range(&window.previous(), PREVIOUS_RANGE);

    let mut requests = vec![
        json!({
            "dateRanges": [current.clone()],
            "dimensions": [{ "name": "date" }],
            "metrics": metrics(&SERIES_METRICS),
            "orderBys": [{ "dimension": { "dimensionName": "date" } }],
        }),
        json!({
            "dateRanges": [current.clone(), previous],
            "metrics": metrics(&TOTAL_METRICS),
        }),
    ];
    for (_, dimension, metric) in BREAKDOWNS {
        requests.push(json!({
            "dateRanges": [current.clone()],
            "dimensions": [{ "name": dimension }],
            "metrics": [{ "name": metric }],
            "orderBys": [{ "metric": { "metricName": metric }, "desc": true }],
            "limit": BREAKDOWN_LIMIT,
        }));
    }
    json!({ "requests": requests })
}

fn parse_number(raw: &str) -> Result<f64, ProviderError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProviderError::Malformed(format!("non-numeric metric value {raw:?}")))
}

/// Translate one row's metric cells into common names. GA rates arrive as
/// fractions and are reported as percentages.
fn row_metrics(report: &RunReportResponse, row: &ReportRow) -> Result<MetricMap, ProviderError> {
    if row.metric_values.len() != report.metric_headers.len() {
        return Err(ProviderError::Malformed(
            "metric values do not line up with metric headers".to_string(),
        ));
    }
    let mut out = MetricMap::new();
    for (header, cell) in report.metric_headers.iter().zip(&row.metric_values) {
        let Some(name) = translate(WEB_TRANSLATION, &header.name) else {
            continue;
        };
        let mut value = parse_number(&cell.value)?;
        if header.name == "bounceRate" {
            value *= 100.0;
        }
        out.insert(name.to_string(), value);
    }
    Ok(out)
}

fn dimension_index(report: &RunReportResponse, name: &str) -> Option<usize> {
    report.dimension_headers.iter().position(|h| h.name == name)
}

fn parse_series(
    window: &TimeWindow,
    report: &RunReportResponse,
) -> Result<Vec<MetricPoint>, ProviderError> {
    if report.rows.is_empty() {
        return Ok(Vec::new());
    }
    let date_idx = dimension_index(report, "date")
        .ok_or_else(|| ProviderError::Malformed("series report lacks a date dimension".to_string()))?;

    let mut rows = BTreeMap::new();
    for row in &report.rows {
        let raw = row
            .dimension_values
            .get(date_idx)
            .map(|c| c.value.as_str())
            .unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map_err(|_| ProviderError::Malformed(format!("unparseable GA date {raw:?}")))?;
        rows.insert(date, row_metrics(report, row)?);
    }
    Ok(zero_fill(window, rows))
}

/// Returns `(current, previous)` totals from the two-range totals report.
///
/// GA omits rows for ranges without data and labels rows through an implicit
/// `dateRange` dimension.
fn parse_totals(report: &RunReportResponse) -> Result<(MetricMap, MetricMap), ProviderError> {
    let range_idx = dimension_index(report, "dateRange").unwrap_or(0);
    let mut current = MetricMap::new();
    let mut previous = MetricMap::new();
    for row in &report.rows {
        let label = row
            .dimension_values
            .get(range_idx)
            .map(|c| c.value.as_str())
            .unwrap_or(CURRENT_RANGE);
        let values = row_metrics(report, row)?;
        match label {
            PREVIOUS_RANGE => previous = values,
            _ => current = values,
        }
    }
    Ok((current, previous))
}

fn parse_breakdown(report: &RunReportResponse) -> Result<Vec<BreakdownRow>, ProviderError> {
    report
        .rows
        .iter()
        .map(|row| {
            let label = row
                .dimension_values
                .first()
                .map(|c| c.value.clone())
                .ok_or_else(|| ProviderError::Malformed("breakdown row without label".to_string()))?;
            let value = row
                .metric_values
                .first()
                .ok_or_else(|| ProviderError::Malformed("breakdown row without value".to_string()))
                .and_then(|c| parse_number(&c.value))?;
            Ok(BreakdownRow { label, value })
        })
        .collect()
}

fn parse_batch(
    window: &TimeWindow,
    batch: BatchRunReportsResponse,
) -> Result<ProviderResult, ProviderError> {
    let expected = 2 + BREAKDOWNS.len();
    if batch.reports.len() != expected {
        return Err(ProviderError::Malformed(format!(
            "expected {expected} reports, got {}",
            batch.reports.len()
        )));
    }

    let mut result = ProviderResult::empty(WEB_TRAFFIC);
    result.series = parse_series(window, &batch.reports[0])?;
    let (current, previous) = parse_totals(&batch.reports[1])?;
    result.totals = current;
    result.previous_totals = Some(previous);

    for ((name, _, _), report) in BREAKDOWNS.iter().zip(&batch.reports[2..]) {
        let rows = parse_breakdown(report)?;
        if !rows.is_empty() {
            result.breakdowns.insert(name.to_string(), rows);
        }
    }
    Ok(result)
}
