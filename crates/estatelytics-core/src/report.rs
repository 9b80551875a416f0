//! Report data model shared by the reader, the provider adapters and the
//! aggregator.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{ErrorKind, ProviderError};
use crate::window::TimeWindow;

/// Provider id of the web-traffic analytics adapter.
pub const WEB_TRAFFIC: &str = "web";
/// Provider id of the edge/CDN analytics adapter.
pub const EDGE: &str = "edge";

pub type MetricMap = BTreeMap<String, f64>;

/// One day of named counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub metrics: MetricMap,
}

impl MetricPoint {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            metrics: MetricMap::new(),
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub label: String,
    pub value: f64,
}

/// Normalised output of one external analytics provider.
///
/// `available == false` means "unknown", never "zero".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub available: bool,
    pub series: Vec<MetricPoint>,
    pub totals: MetricMap,
    /// Same metrics for the preceding window when the provider returned them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_totals: Option<MetricMap>,
    pub breakdowns: BTreeMap<String, Vec<BreakdownRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ProviderResult {
    /// A reachable provider with no data yet filled in.
    pub fn empty(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            available: true,
            series: Vec::new(),
            totals: MetricMap::new(),
            previous_totals: None,
            breakdowns: BTreeMap::new(),
            error: None,
        }
    }

    pub fn unavailable(provider_id: &str, kind: ErrorKind) -> Self {
        Self {
            available: false,
            error: Some(kind),
            ..Self::empty(provider_id)
        }
    }

    pub fn from_error(provider_id: &str, err: &ProviderError) -> Self {
        Self::unavailable(provider_id, err.kind())
    }

    /// True when this provider can supply the primary series.
    pub fn has_series(&self) -> bool {
        self.available && !self.series.is_empty()
    }

    pub fn total(&self, name: &str) -> Option<f64> {
        self.totals.get(name).copied()
    }

    pub fn previous_total(&self, name: &str) -> Option<f64> {
        self.previous_totals
            .as_ref()
            .map(|prev| prev.get(name).copied().unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub name: String,
    pub count: u64,
    pub order: usize,
    /// Percent of the previous stage that reached this one. `None` for the
    /// first stage.
    pub conversion_rate: Option<f64>,
    /// Count lost since the previous stage (0 when this stage is larger).
    pub drop_off: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiNumber {
    Count(u64),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiValue {
    pub value: KpiNumber,
    pub delta_percent: Option<f64>,
    pub direction: Direction,
}

/// Where the primary series of a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    WebTraffic,
    Edge,
    /// Estimated from internal period totals. Not ground truth.
    Synthetic,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedReport {
    pub window: TimeWindow,
    pub primary_series: Vec<MetricPoint>,
    pub series_source: SeriesSource,
    pub kpis: BTreeMap<String, KpiValue>,
    pub funnel: Vec<FunnelStage>,
    pub source_availability: BTreeMap<String, bool>,
    /// Error kind per provider that did not contribute.
    pub provider_errors: BTreeMap<String, ErrorKind>,
    /// Provider breakdowns keyed `"<provider>.<breakdown>"`.
    pub breakdowns: BTreeMap<String, Vec<BreakdownRow>>,
    pub generated_at: DateTime<Utc>,
}

impl UnifiedReport {
    /// True when at least one external provider contributed.
    pub fn any_provider_connected(&self) -> bool {
        self.source_availability.values().any(|available| *available)
    }
}
