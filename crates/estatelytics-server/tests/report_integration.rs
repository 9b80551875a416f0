use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use estatelytics_core::config::{Config, EdgeConfig, WebTrafficConfig};
use estatelytics_core::error::ErrorKind;
use estatelytics_core::funnel::{FunnelCounterReader, FunnelCounts};
use estatelytics_core::provider::AnalyticsProvider;
use estatelytics_core::report::{
    Direction, KpiNumber, MetricPoint, ProviderResult, SeriesSource, EDGE, WEB_TRAFFIC,
};
use estatelytics_core::window::{RangeKind, TimeWindow};
use estatelytics_duckdb::DuckDbBackend;
use estatelytics_server::app::build_app;
use estatelytics_server::report::ReportEngine;
use estatelytics_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/estatelytics-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        cors_origins: vec![],
        provider_timeout_ms: 200,
        provider_retries: 0,
        report_timeout_ms: 5_000,
        web_traffic: WebTrafficConfig::default(),
        edge: EdgeConfig::default(),
    }
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn get(app: axum::Router, uri: &str) -> axum::http::Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    app.oneshot(request).await.expect("request")
}

/// 20 distinct visitors and one inquiry yesterday at noon, well inside any
/// preset window even if the day rolls over mid-test.
async fn seed_recent(db: &DuckDbBackend) {
    let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
    let ts = format!("{} 12:00:00", yesterday.format("%Y-%m-%d"));
    let conn = db.conn_for_test().await;
    for i in 0..20 {
        conn.execute(
            "INSERT INTO page_views (id, visitor_id, path, created_at) VALUES (?1, ?2, '/', CAST(?3 AS TIMESTAMP))",
            estatelytics_duckdb::duckdb::params![format!("pv{i}"), format!("visitor_{i}"), ts],
        )
        .expect("insert page view");
    }
    conn.execute(
        "INSERT INTO leads (id, user_id, property_id, source, created_at) VALUES ('l1', NULL, 'p1', 'contact_form', CAST(?1 AS TIMESTAMP))",
        estatelytics_duckdb::duckdb::params![ts],
    )
    .expect("insert lead");
}

struct StubProvider {
    id: &'static str,
    result: ProviderResult,
}

#[async_trait]
impl AnalyticsProvider for StubProvider {
    fn provider_id(&self) -> &'static str {
        self.id
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, _window: &TimeWindow) -> ProviderResult {
        self.result.clone()
    }
}

struct SlowProvider;

#[async_trait]
impl AnalyticsProvider for SlowProvider {
    fn provider_id(&self) -> &'static str {
        EDGE
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, _window: &TimeWindow) -> ProviderResult {
        tokio::time::sleep(Duration::from_secs(30)).await;
        ProviderResult::empty(EDGE)
    }
}

struct FailingReader;

#[async_trait]
impl FunnelCounterReader for FailingReader {
    async fn get_funnel_counts(&self, _window: &TimeWindow) -> anyhow::Result<FunnelCounts> {
        anyhow::bail!("store offline")
    }
}

/// Answers only for the window ending on `current_end`.
struct CurrentOnlyReader {
    current_end: NaiveDate,
    counts: FunnelCounts,
}

#[async_trait]
impl FunnelCounterReader for CurrentOnlyReader {
    async fn get_funnel_counts(&self, window: &TimeWindow) -> anyhow::Result<FunnelCounts> {
        if window.end != self.current_end {
            anyhow::bail!("previous partition unavailable");
        }
        Ok(self.counts)
    }
}

fn web_result(window: &TimeWindow) -> ProviderResult {
    let mut result = ProviderResult::empty(WEB_TRAFFIC);
    result.series = window
        .dates()
        .map(|date| {
            let mut point = MetricPoint::new(date);
            point.metrics.insert("views".to_string(), 100.0);
            point
        })
        .collect();
    result.totals.insert("views".to_string(), 100.0 * window.days as f64);
    result.totals.insert("sessions".to_string(), 50.0);
    result
}

#[tokio::test]
async fn test_unconfigured_providers_yield_synthetic_report() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    seed_recent(&db).await;
    let app = build_app(Arc::new(AppState::new(db, test_config()).expect("state")));

    let response = get(app, "/api/reports/marketing").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let report = &json["data"];

    assert_eq!(report["window"]["days"], 30);
    assert_eq!(report["series_source"], "synthetic");
    assert_eq!(report["primary_series"].as_array().expect("series").len(), 30);
    assert_eq!(report["source_availability"]["web"], false);
    assert_eq!(report["source_availability"]["edge"], false);
    assert_eq!(report["provider_errors"]["web"], "provider_unconfigured");
    assert_eq!(report["kpis"]["visitors"]["value"], 20);
    assert_eq!(report["kpis"]["inquiries"]["value"], 1);
    assert_eq!(report["kpis"]["conversion_rate"]["value"], 5.0);
    assert!(report["kpis"].get("page_views").is_none());
    assert!(report["kpis"].get("requests").is_none());
    assert_eq!(report["funnel"].as_array().expect("funnel").len(), 5);
    assert_eq!(report["funnel"][0]["name"], "Visitors");
}

#[tokio::test]
async fn test_invalid_range_is_rejected() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, test_config()).expect("state")));

    let response = get(app, "/api/reports/marketing?range=14d").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "invalid_range");
    assert_eq!(json["error"]["field"], "range");
}

#[tokio::test]
async fn test_custom_dates_are_accepted() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, test_config()).expect("state")));

    let response = get(
        app,
        "/api/reports/marketing?start_date=2026-03-01&end_date=2026-03-10",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["window"]["days"], 10);
    assert_eq!(json["data"]["primary_series"][0]["date"], "2026-03-01");
}

#[tokio::test]
async fn test_web_series_wins_and_edge_kpis_are_omitted() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let window = TimeWindow::resolve(RangeKind::Last7Days);
    let web: Arc<dyn AnalyticsProvider> = Arc::new(StubProvider {
        id: WEB_TRAFFIC,
        result: web_result(&window),
    });
    let edge: Arc<dyn AnalyticsProvider> = Arc::new(StubProvider {
        id: EDGE,
        result: ProviderResult::unavailable(EDGE, ErrorKind::ProviderUnreachable),
    });
    let state = AppState::with_providers(db, test_config(), web, edge);
    let app = build_app(Arc::new(state));

    let response = get(app, "/api/reports/marketing?range=7d").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let report = &json["data"];

    assert_eq!(report["series_source"], "web_traffic");
    let series = report["primary_series"].as_array().expect("series");
    assert_eq!(series.len(), 7);
    assert!(series.iter().all(|p| p["metrics"]["views"] == 100.0));
    assert_eq!(report["kpis"]["page_views"]["value"], 700);
    assert_eq!(report["source_availability"]["web"], true);
    assert_eq!(report["provider_errors"]["edge"], "provider_unreachable");
    assert!(report["kpis"].get("cache_hit_rate").is_none());
}

#[tokio::test]
async fn test_slow_provider_is_cut_off() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("in-memory DuckDB"));
    let window = TimeWindow::resolve(RangeKind::Last7Days);
    let engine = ReportEngine::new(
        db,
        Arc::new(StubProvider {
            id: WEB_TRAFFIC,
            result: ProviderResult::unavailable(WEB_TRAFFIC, ErrorKind::ProviderUnconfigured),
        }),
        Arc::new(SlowProvider),
        Duration::from_millis(50),
    );

    let report = tokio::time::timeout(Duration::from_secs(5), engine.build(&window))
        .await
        .expect("engine respects provider timeout")
        .expect("report");
    assert_eq!(report.series_source, SeriesSource::Synthetic);
    assert_eq!(report.source_availability.get(EDGE), Some(&false));
    assert_eq!(
        report.provider_errors.get(EDGE),
        Some(&ErrorKind::ProviderUnreachable)
    );
}

#[tokio::test]
async fn test_internal_store_failure_is_an_error() {
    let unconfigured = |id: &'static str| -> Arc<dyn AnalyticsProvider> {
        Arc::new(StubProvider {
            id,
            result: ProviderResult::unavailable(id, ErrorKind::ProviderUnconfigured),
        })
    };
    let engine = ReportEngine::new(
        Arc::new(FailingReader),
        unconfigured(WEB_TRAFFIC),
        unconfigured(EDGE),
        Duration::from_millis(50),
    );
    let window = TimeWindow::resolve(RangeKind::Last30Days);
    assert!(engine.build(&window).await.is_err());
}

#[tokio::test]
async fn test_previous_window_failure_only_drops_deltas() {
    let window = TimeWindow::resolve_at(
        RangeKind::Last30Days,
        NaiveDate::from_ymd_opt(2026, 6, 30).expect("date"),
    );
    let reader = CurrentOnlyReader {
        current_end: window.end,
        counts: FunnelCounts {
            visitors: 20,
            registered_users: 6,
            engaged_users: 4,
            inquiries: 1,
            bookings: 1,
            wishlist_actions: 9,
            saved_searches: 2,
        },
    };
    let unconfigured = |id: &'static str| -> Arc<dyn AnalyticsProvider> {
        Arc::new(StubProvider {
            id,
            result: ProviderResult::unavailable(id, ErrorKind::ProviderUnconfigured),
        })
    };
    let engine = ReportEngine::new(
        Arc::new(reader),
        unconfigured(WEB_TRAFFIC),
        unconfigured(EDGE),
        Duration::from_millis(50),
    );

    let report = engine.build(&window).await.expect("report survives");
    assert_eq!(report.kpis["visitors"].value, KpiNumber::Count(20));
    assert_eq!(report.kpis["conversion_rate"].value, KpiNumber::Number(5.0));
    for key in [
        "visitors",
        "registered_users",
        "engaged_users",
        "inquiries",
        "bookings",
        "wishlist_actions",
        "saved_searches",
        "conversion_rate",
        "booking_rate",
    ] {
        let kpi = &report.kpis[key];
        assert_eq!(kpi.delta_percent, None, "{key} kept a delta");
        assert_eq!(kpi.direction, Direction::Neutral, "{key} has a direction");
    }
    assert_eq!(report.funnel[0].count, 20);
}
