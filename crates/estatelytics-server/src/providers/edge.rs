//! Edge/CDN adapter for the Cloudflare GraphQL Analytics API.
//!
//! A single query uses three aliases on `httpRequests1dGroups`: the daily
//! series, the whole current window aggregated (uniques are not additive
//! across days) and the whole previous window aggregated.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use estatelytics_core::config::EdgeConfig;
use estatelytics_core::error::ProviderError;
use estatelytics_core::provider::{translate_all, zero_fill, AnalyticsProvider, Translation};
use estatelytics_core::report::{BreakdownRow, MetricMap, ProviderResult, EDGE};
use estatelytics_core::window::TimeWindow;

use super::http::{decode_json, send_with_retry, RetryPolicy};

/// Cloudflare field name → common metric name.
pub const EDGE_TRANSLATION: Translation = &[
    ("requests", "requests"),
    ("cachedRequests", "cached_requests"),
    ("bytes", "bandwidth_bytes"),
    ("cachedBytes", "cached_bandwidth_bytes"),
    ("threats", "threats"),
    ("pageViews", "views"),
    ("uniques", "visitors"),
];

const BREAKDOWN_LIMIT: usize = 10;

const ZONE_ANALYTICS_QUERY: &str = r#"
query ZoneAnalytics($zoneTag: string!, $since: Date!, $until: Date!, $prevSince: Date!, $prevUntil: Date!) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      series: httpRequests1dGroups(
        limit: 1000
        filter: { date_geq: $since, date_leq: $until }
        orderBy: [date_ASC]
      ) {
        dimensions { date }
        sum { requests cachedRequests bytes cachedBytes threats pageViews }
        uniq { uniques }
      }
      current: httpRequests1dGroups(limit: 1, filter: { date_geq: $since, date_leq: $until }) {
        sum {
          requests cachedRequests bytes cachedBytes threats pageViews
          countryMap { clientCountryName requests }
          responseStatusMap { edgeResponseStatus requests }
        }
        uniq { uniques }
      }
      previous: httpRequests1dGroups(limit: 1, filter: { date_geq: $prevSince, date_leq: $prevUntil }) {
        sum { requests cachedRequests bytes cachedBytes threats pageViews }
        uniq { uniques }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    #[serde(default)]
    zones: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    #[serde(default)]
    series: Vec<Group>,
    #[serde(default)]
    current: Vec<Group>,
    #[serde(default)]
    previous: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default)]
    dimensions: Option<Dimensions>,
    sum: Sum,
    #[serde(default)]
    uniq: Option<Uniq>,
}

#[derive(Debug, Deserialize)]
struct Dimensions {
    date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sum {
    #[serde(default)]
    requests: f64,
    #[serde(default)]
    cached_requests: f64,
    #[serde(default)]
    bytes: f64,
    #[serde(default)]
    cached_bytes: f64,
    #[serde(default)]
    threats: f64,
    #[serde(default)]
    page_views: f64,
    #[serde(default)]
    country_map: Vec<CountryCount>,
    #[serde(default)]
    response_status_map: Vec<StatusCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountryCount {
    client_country_name: String,
    requests: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusCount {
    edge_response_status: u16,
    requests: f64,
}

#[derive(Debug, Deserialize)]
struct Uniq {
    #[serde(default)]
    uniques: f64,
}

pub struct EdgeProvider {
    client: Client,
    config: EdgeConfig,
    retry: RetryPolicy,
}

impl EdgeProvider {
    pub fn new(client: Client, config: EdgeConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    async fn try_fetch(&self, window: &TimeWindow) -> Result<ProviderResult, ProviderError> {
        let (Some(token), Some(zone_id)) = (
            self.config.api_token.as_deref(),
            self.config.zone_id.as_deref(),
        ) else {
            return Err(ProviderError::Unconfigured(
                "ESTATELYTICS_CF_API_TOKEN and ESTATELYTICS_CF_ZONE_ID are required".to_string(),
            ));
        };
        let endpoint = url::Url::parse(&format!(
            "{}/graphql",
            self.config.api_base.trim_end_matches('/')
        ))
        .map_err(|e| ProviderError::Unconfigured(format!("invalid Cloudflare API base: {e}")))?;

        let body = query_body(zone_id, window);
        let resp = send_with_retry(EDGE, self.retry, || {
            self.client
                .post(endpoint.clone())
                .bearer_auth(token)
                .json(&body)
        })
        .await?;
        let parsed: GraphqlResponse = decode_json(EDGE, resp).await?;
        parse_response(window, parsed)
    }
}

#[async_trait]
impl AnalyticsProvider for EdgeProvider {
    fn provider_id(&self) -> &'static str {
        EDGE
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn fetch(&self, window: &TimeWindow) -> ProviderResult {
        super::into_result(EDGE, self.try_fetch(window).await)
    }
}

fn query_body(zone_id: &str, window: &TimeWindow) -> serde_json::Value {
    let previous = window.previous();
    let day = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
    json!({
        "query": ZONE_ANALYTICS_QUERY,
        "variables": {
            "zoneTag": zone_id,
            "since": day(window.first_day()),
            "until": day(window.end),
            "prevSince": day(previous.first_day()),
            "prevUntil": day(previous.end),
        }
    })
}

fn group_metrics(group: &Group) -> MetricMap {
    let sum = &group.sum;
    let mut fields = vec![
        ("requests", sum.requests),
        ("cachedRequests", sum.cached_requests),
        ("bytes", sum.bytes),
        ("cachedBytes", sum.cached_bytes),
        ("threats", sum.threats),
        ("pageViews", sum.page_views),
    ];
    if let Some(uniq) = &group.uniq {
        fields.push(("uniques", uniq.uniques));
    }
    translate_all(EDGE_TRANSLATION, fields)
}

/// Top entries by value, labels merged case-sensitively.
fn top_rows(entries: impl IntoIterator<Item = (String, f64)>) -> Vec<BreakdownRow> {
    let mut merged: BTreeMap<String, f64> = BTreeMap::new();
    for (label, value) in entries {
        *merged.entry(label).or_insert(0.0) += value;
    }
    let mut rows: Vec<BreakdownRow> = merged
        .into_iter()
        .map(|(label, value)| BreakdownRow { label, value })
        .collect();
    rows.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    rows.truncate(BREAKDOWN_LIMIT);
    rows
}

fn parse_response(
    window: &TimeWindow,
    parsed: GraphqlResponse,
) -> Result<ProviderResult, ProviderError> {
    if let Some(errors) = parsed.errors.filter(|errs| !errs.is_empty()) {
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        return Err(ProviderError::Unreachable(format!(
            "edge query rejected: {}",
            messages.join("; ")
        )));
    }
    let data = parsed
        .data
        .ok_or_else(|| ProviderError::Malformed("response has neither data nor errors".to_string()))?;
    let zone = data
        .viewer
        .zones
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Unreachable("zone not visible to the API token".to_string()))?;

    let mut result = ProviderResult::empty(EDGE);

    let mut daily = BTreeMap::new();
    for group in &zone.series {
        let date = group
            .dimensions
            .as_ref()
            .map(|d| d.date)
            .ok_or_else(|| ProviderError::Malformed("series group without date".to_string()))?;
        daily.insert(date, group_metrics(group));
    }
    result.series = zero_fill(window, daily);

    if let Some(current) = zone.current.first() {
        result.totals = group_metrics(current);
        let countries = top_rows(
            current
                .sum
                .country_map
                .iter()
                .map(|c| (c.client_country_name.clone(), c.requests)),
        );
        if !countries.is_empty() {
            result.breakdowns.insert("countries".to_string(), countries);
        }
        let statuses = top_rows(
            current
                .sum
                .response_status_map
                .iter()
                .map(|s| (s.edge_response_status.to_string(), s.requests)),
        );
        if !statuses.is_empty() {
            result.breakdowns.insert("status_codes".to_string(), statuses);
        }
    }
    result.previous_totals = Some(
        zone.previous
            .first()
            .map(group_metrics)
            .unwrap_or_default(),
    );

    Ok(result)
}
