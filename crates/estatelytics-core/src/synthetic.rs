//! Estimated daily series for when only period totals are known.
//!
//! The output is presentation filler: a period total spread across the window
//! with bounded random variance. It is not a reconstruction of real daily
//! traffic and must never feed exports, alerts or anything persisted. Reports
//! built from it carry [`SeriesSource::Synthetic`](crate::report::SeriesSource).

use rand::Rng;

use crate::report::MetricPoint;
use crate::window::TimeWindow;

pub const METRIC_VIEWS: &str = "views";
pub const METRIC_LEADS: &str = "leads";
pub const METRIC_BOOKINGS: &str = "bookings";

/// Maximum relative swing applied to each day's share (±15%).
const JITTER_SPAN: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTotals {
    /// Traffic-like counter, floored at 1 per day.
    pub primary: f64,
    /// Leads, floored at 0.
    pub secondary: f64,
    /// Bookings, floored at 0.
    pub tertiary: f64,
}

pub fn synthesize<R: Rng>(
    window: &TimeWindow,
    totals: SyntheticTotals,
    rng: &mut R,
) -> Vec<MetricPoint> {
    let days = window.days.max(1) as f64;
    let metrics = [
        (METRIC_VIEWS, totals.primary, 1.0),
        (METRIC_LEADS, totals.secondary, 0.0),
        (METRIC_BOOKINGS, totals.tertiary, 0.0),
    ];

    window
        .dates()
        .map(|date| {
            let mut point = MetricPoint::new(date);
            for (name, total, floor) in metrics {
                let per_day = total.max(0.0) / days;
                let jittered = per_day * (1.0 + (rng.gen::<f64>() - 0.5) * JITTER_SPAN);
                point
                    .metrics
                    .insert(name.to_string(), jittered.round().max(floor));
            }
            point
        })
        .collect()
}
