//! Reconciles internal counters with provider results into one report.
//!
//! Primary series precedence, highest first:
//!
//! 1. web-traffic provider series (available and non-empty)
//! 2. edge provider series (available and non-empty)
//! 3. synthetic series spread from internal period totals
//!
//! The winning series is copied verbatim; sources are never mixed. KPIs that
//! depend on an unavailable provider are left out of the map rather than
//! reported as zero.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::Rng;

use crate::funnel::{build_funnel, FunnelCounts, InternalCounts};
use crate::kpi::{
    count_kpi, format_bytes, format_duration, number_kpi, percent, round1, text_kpi,
};
use crate::provider::sum_series;
use crate::report::{KpiValue, MetricPoint, ProviderResult, SeriesSource, UnifiedReport};
use crate::synthetic::{synthesize, SyntheticTotals};
use crate::window::TimeWindow;

pub fn aggregate(
    window: &TimeWindow,
    internal: &InternalCounts,
    web: &ProviderResult,
    edge: &ProviderResult,
) -> UnifiedReport {
    aggregate_with_rng(window, internal, web, edge, &mut rand::thread_rng())
}

/// [`aggregate`] with an explicit random source for the synthetic fallback.
pub fn aggregate_with_rng<R: Rng>(
    window: &TimeWindow,
    internal: &InternalCounts,
    web: &ProviderResult,
    edge: &ProviderResult,
    rng: &mut R,
) -> UnifiedReport {
    let (primary_series, series_source) = select_primary_series(window, internal, web, edge, rng);

    let mut kpis = internal_kpis(internal);
    if web.available {
        kpis.extend(web_kpis(web));
    }
    if edge.available {
        kpis.extend(edge_kpis(edge));
    }

    let mut source_availability = BTreeMap::new();
    let mut provider_errors = BTreeMap::new();
    let mut breakdowns = BTreeMap::new();
    for result in [web, edge] {
        source_availability.insert(result.provider_id.clone(), result.available);
        if let Some(kind) = result.error.filter(|_| !result.available) {
            provider_errors.insert(result.provider_id.clone(), kind);
        }
        if result.available {
            for (name, rows) in &result.breakdowns {
                breakdowns.insert(format!("{}.{}", result.provider_id, name), rows.clone());
            }
        }
    }

    tracing::debug!(
        days = window.days,
        series_source = ?series_source,
        web = web.available,
        edge = edge.available,
        "report aggregated"
    );

    UnifiedReport {
        window: *window,
        primary_series,
        series_source,
        kpis,
        funnel: build_funnel(&internal.current),
        source_availability,
        provider_errors,
        breakdowns,
        generated_at: Utc::now(),
    }
}

fn select_primary_series<R: Rng>(
    window: &TimeWindow,
    internal: &InternalCounts,
    web: &ProviderResult,
    edge: &ProviderResult,
    rng: &mut R,
) -> (Vec<MetricPoint>, SeriesSource) {
    if web.has_series() {
        return (web.series.clone(), SeriesSource::WebTraffic);
    }
    if edge.has_series() {
        return (edge.series.clone(), SeriesSource::Edge);
    }
    let totals = SyntheticTotals {
        primary: internal.current.visitors as f64,
        secondary: internal.current.inquiries as f64,
        tertiary: internal.current.bookings as f64,
    };
    (synthesize(window, totals, rng), SeriesSource::Synthetic)
}

fn internal_kpis(internal: &InternalCounts) -> BTreeMap<String, KpiValue> {
    let current = &internal.current;
    let previous = internal.previous.as_ref();
    let prev = |f: fn(&FunnelCounts) -> u64| previous.map(f);

    let conversion = |c: &FunnelCounts| percent(c.inquiries as f64, c.visitors as f64);
    let booking = |c: &FunnelCounts| percent(c.bookings as f64, c.inquiries as f64);

    BTreeMap::from([
        (
            "visitors".to_string(),
            count_kpi(current.visitors, prev(|c| c.visitors)),
        ),
        (
            "registered_users".to_string(),
            count_kpi(current.registered_users, prev(|c| c.registered_users)),
        ),
        (
            "engaged_users".to_string(),
            count_kpi(current.engaged_users, prev(|c| c.engaged_users)),
        ),
        (
            "inquiries".to_string(),
            count_kpi(current.inquiries, prev(|c| c.inquiries)),
        ),
        (
            "bookings".to_string(),
            count_kpi(current.bookings, prev(|c| c.bookings)),
        ),
        (
            "wishlist_actions".to_string(),
            count_kpi(current.wishlist_actions, prev(|c| c.wishlist_actions)),
        ),
        (
            "saved_searches".to_string(),
            count_kpi(current.saved_searches, prev(|c| c.saved_searches)),
        ),
        (
            "conversion_rate".to_string(),
            number_kpi(conversion(current), previous.map(conversion)),
        ),
        (
            "booking_rate".to_string(),
            number_kpi(booking(current), previous.map(booking)),
        ),
    ])
}

/// Current total for `name`, falling back to the series sum.
///
/// Only called for available providers, where a missing metric means the
/// provider reported no traffic.
fn provider_total(result: &ProviderResult, name: &str) -> f64 {
    result
        .total(name)
        .or_else(|| sum_series(&result.series).get(name).copied())
        .unwrap_or(0.0)
}

fn count_from(result: &ProviderResult, name: &str) -> KpiValue {
    let current = provider_total(result, name);
    count_kpi(
        current.max(0.0).round() as u64,
        result
            .previous_total(name)
            .map(|prev| prev.max(0.0).round() as u64),
    )
}

fn web_kpis(web: &ProviderResult) -> BTreeMap<String, KpiValue> {
    // Rates do not sum across days, so these come from window totals only.
    let bounce = web.total("bounce_rate").unwrap_or(0.0).clamp(0.0, 100.0);
    let duration = web.total("avg_session_duration").unwrap_or(0.0);

    BTreeMap::from([
        ("page_views".to_string(), count_from(web, "views")),
        ("sessions".to_string(), count_from(web, "sessions")),
        ("web_users".to_string(), count_from(web, "visitors")),
        (
            "bounce_rate".to_string(),
            number_kpi(
                round1(bounce),
                web.previous_total("bounce_rate").map(round1),
            ),
        ),
        (
            "avg_session_duration".to_string(),
            text_kpi(
                format_duration(duration),
                duration,
                web.previous_total("avg_session_duration"),
            ),
        ),
    ])
}

fn edge_kpis(edge: &ProviderResult) -> BTreeMap<String, KpiValue> {
    let requests = provider_total(edge, "requests");
    let cached = provider_total(edge, "cached_requests");
    let previous_hit_rate = match (
        edge.previous_total("cached_requests"),
        edge.previous_total("requests"),
    ) {
        (Some(prev_cached), Some(prev_requests)) => Some(percent(prev_cached, prev_requests)),
        _ => None,
    };
    let bandwidth = provider_total(edge, "bandwidth_bytes");

    BTreeMap::from([
        ("requests".to_string(), count_from(edge, "requests")),
        (
            "cache_hit_rate".to_string(),
            number_kpi(percent(cached, requests), previous_hit_rate),
        ),
        (
            "bandwidth".to_string(),
            text_kpi(
                format_bytes(bandwidth),
                bandwidth,
                edge.previous_total("bandwidth_bytes"),
            ),
        ),
        ("threats_blocked".to_string(), count_from(edge, "threats")),
        ("edge_visitors".to_string(), count_from(edge, "visitors")),
    ])
}
