//! External analytics provider contract.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::report::{MetricMap, MetricPoint, ProviderResult};
use crate::window::TimeWindow;

/// One third-party analytics source.
///
/// `fetch` never fails: transport, auth and decoding problems come back as
/// an unavailable [`ProviderResult`] carrying an error kind.
#[async_trait::async_trait]
pub trait AnalyticsProvider: Send + Sync + 'static {
    fn provider_id(&self) -> &'static str;

    /// Whether credentials are present. Does not contact the upstream.
    fn is_configured(&self) -> bool;

    async fn fetch(&self, window: &TimeWindow) -> ProviderResult;
}

/// Fixed mapping from a provider's native field names to common metric names.
pub type Translation = &'static [(&'static str, &'static str)];

pub fn translate(table: Translation, native: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| *from == native)
        .map(|(_, to)| *to)
}

/// Translate native `(field, value)` pairs into a metric map, dropping
/// fields the table does not know.
pub fn translate_all<'a, I>(table: Translation, fields: I) -> MetricMap
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut out = MetricMap::new();
    for (native, value) in fields {
        if let Some(name) = translate(table, native) {
            *out.entry(name.to_string()).or_insert(0.0) += value;
        }
    }
    out
}

/// Expand sparse daily rows to one point per window day.
///
/// Days missing upstream get every metric seen anywhere in the input set to
/// zero. Rows outside the window are dropped. An empty input stays empty so
/// "no data" remains distinguishable from "zero-filled".
pub fn zero_fill(window: &TimeWindow, mut rows: BTreeMap<NaiveDate, MetricMap>) -> Vec<MetricPoint> {
    rows.retain(|date, _| window.contains(*date));
    if rows.is_empty() {
        return Vec::new();
    }
    let names: Vec<String> = {
        let mut names: Vec<String> = rows.values().flat_map(|m| m.keys().cloned()).collect();
        names.sort();
        names.dedup();
        names
    };

    window
        .dates()
        .map(|date| {
            let mut point = MetricPoint::new(date);
            let found = rows.get(&date);
            for name in &names {
                let value = found.and_then(|m| m.get(name)).copied().unwrap_or(0.0);
                point.metrics.insert(name.clone(), value);
            }
            point
        })
        .collect()
}

/// Sum every metric across a series.
pub fn sum_series(series: &[MetricPoint]) -> MetricMap {
    let mut totals = MetricMap::new();
    for point in series {
        for (name, value) in &point.metrics {
            *totals.entry(name.clone()).or_insert(0.0) += value;
        }
    }
    totals
}
