use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use estatelytics_core::window::{RangeKind, TimeWindow};

use crate::{error::AppError, state::AppState};

const DEFAULT_RANGE: &str = "30d";
const MAX_CUSTOM_DAYS: i64 = 366;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

/// Resolve the request's window. Explicit dates are both inclusive and win
/// over `range`.
fn resolve_window(query: &ReportQuery) -> Result<TimeWindow, AppError> {
    match (query.start_date.as_deref(), query.end_date.as_deref()) {
        (Some(start), Some(end)) => {
            let first = parse_date(start, "start_date")?;
            let last = parse_date(end, "end_date")?;
            if last < first {
                return Err(AppError::BadRequest(
                    "start_date must not be after end_date".to_string(),
                ));
            }
            let window = TimeWindow::custom(first - Duration::days(1), last)?;
            if window.days > MAX_CUSTOM_DAYS {
                return Err(AppError::BadRequest(format!(
                    "custom windows are limited to {MAX_CUSTOM_DAYS} days"
                )));
            }
            Ok(window)
        }
        (None, None) => {
            let kind = RangeKind::parse(query.range.as_deref().unwrap_or(DEFAULT_RANGE))?;
            tracing::debug!(range = kind.slug(), "resolved preset window");
            Ok(TimeWindow::resolve(kind))
        }
        _ => Err(AppError::BadRequest(
            "start_date and end_date must be given together".to_string(),
        )),
    }
}

/// `GET /api/reports/marketing` — unified marketing report.
#[tracing::instrument(skip(state))]
pub async fn marketing_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(&query)?;
    let report = tokio::time::timeout(state.config.report_timeout(), state.engine.build(&window))
        .await
        .map_err(|_| AppError::Timeout)??;
    Ok(Json(json!({ "data": report })))
}
