//! KPI arithmetic: zero-guarded rates, period-over-period deltas and display
//! formatting.

use crate::report::{Direction, KpiNumber, KpiValue};

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole * 100`, rounded to one decimal and clamped to `[0, 100]`.
///
/// Returns 0 when `whole` is zero or either input is not finite.
pub fn percent(part: f64, whole: f64) -> f64 {
    ratio_percent(part, whole).clamp(0.0, 100.0)
}

/// `part / whole * 100` rounded to one decimal, zero-guarded but not clamped.
pub fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !whole.is_finite() || !part.is_finite() {
        return 0.0;
    }
    round1(part / whole * 100.0)
}

/// Compare `current` against the preceding window's value.
///
/// A rise from zero reports the literal increase instead of an infinite
/// percentage.
pub fn delta(current: f64, previous: Option<f64>) -> (Option<f64>, Direction) {
    let Some(previous) = previous else {
        return (None, Direction::Neutral);
    };
    if previous == 0.0 {
        return if current > 0.0 {
            (Some(round1(current)), Direction::Increase)
        } else if current < 0.0 {
            (Some(round1(current)), Direction::Decrease)
        } else {
            (Some(0.0), Direction::Neutral)
        };
    }
    let pct = round1((current - previous) / previous.abs() * 100.0);
    let direction = if pct > 0.0 {
        Direction::Increase
    } else if pct < 0.0 {
        Direction::Decrease
    } else {
        Direction::Neutral
    };
    (Some(pct), direction)
}

pub fn count_kpi(current: u64, previous: Option<u64>) -> KpiValue {
    let (delta_percent, direction) = delta(current as f64, previous.map(|p| p as f64));
    KpiValue {
        value: KpiNumber::Count(current),
        delta_percent,
        direction,
    }
}

pub fn number_kpi(current: f64, previous: Option<f64>) -> KpiValue {
    let (delta_percent, direction) = delta(current, previous);
    KpiValue {
        value: KpiNumber::Number(current),
        delta_percent,
        direction,
    }
}

/// KPI whose display value is text but whose delta is computed numerically.
pub fn text_kpi(display: String, current: f64, previous: Option<f64>) -> KpiValue {
    let (delta_percent, direction) = delta(current, previous);
    KpiValue {
        value: KpiNumber::Text(display),
        delta_percent,
        direction,
    }
}

/// `125.4` → `"2m 05s"`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let (minutes, secs) = (total / 60, total % 60);
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m {secs:02}s")
    }
}

/// Bytes in binary units with one decimal, e.g. `"1.5 GB"`.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", value.round() as u64)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
