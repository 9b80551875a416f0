//! Report time windows.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Symbolic range selectors accepted by the report endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    Last7Days,
    Last30Days,
    Last90Days,
    Last365Days,
}

impl RangeKind {
    pub const ALL: [RangeKind; 4] = [
        RangeKind::Last7Days,
        RangeKind::Last30Days,
        RangeKind::Last90Days,
        RangeKind::Last365Days,
    ];

    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        match raw.trim() {
            "7d" | "last_7_days" | "week" => Ok(Self::Last7Days),
            "30d" | "last_30_days" | "month" => Ok(Self::Last30Days),
            "90d" | "last_90_days" | "quarter" => Ok(Self::Last90Days),
            "365d" | "last_365_days" | "year" => Ok(Self::Last365Days),
            other => Err(ReportError::InvalidRangeKind(other.to_string())),
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::Last90Days => 90,
            Self::Last365Days => 365,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Last90Days => "90d",
            Self::Last365Days => "365d",
        }
    }
}

/// A concrete report window.
///
/// `end - start == days` always holds. The window covers the `days` calendar
/// days `start + 1 ..= end`, so a 7-day window ending today contains today and
/// the six days before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

impl TimeWindow {
    /// Resolve a preset relative to the current UTC day.
    pub fn resolve(kind: RangeKind) -> Self {
        Self::resolve_at(kind, Utc::now().date_naive())
    }

    pub fn resolve_at(kind: RangeKind, today: NaiveDate) -> Self {
        let days = kind.days();
        Self {
            start: today - Duration::days(days),
            end: today,
            days,
        }
    }

    /// Build a window from explicit bounds. `start` must be strictly before `end`.
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start >= end {
            return Err(ReportError::InvalidWindow(format!(
                "start {start} must be before end {end}"
            )));
        }
        Ok(Self {
            start,
            end,
            days: (end - start).num_days(),
        })
    }

    /// First calendar day covered by the window.
    pub fn first_day(&self) -> NaiveDate {
        self.start + Duration::days(1)
    }

    /// Every covered calendar day in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first_day();
        (0..self.days).map(move |offset| first + Duration::days(offset))
    }

    /// The equally sized window immediately preceding this one.
    pub fn previous(&self) -> Self {
        Self {
            start: self.start - Duration::days(self.days),
            end: self.start,
            days: self.days,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date > self.start && date <= self.end
    }
}
