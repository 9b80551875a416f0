//! Provider adapters against local fake upstreams bound to `127.0.0.1:0`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use estatelytics_core::config::{Config, EdgeConfig, WebTrafficConfig};
use estatelytics_core::error::ErrorKind;
use estatelytics_core::provider::AnalyticsProvider;
use estatelytics_core::window::{RangeKind, TimeWindow};
use estatelytics_duckdb::DuckDbBackend;
use estatelytics_server::app::build_app;
use estatelytics_server::providers::bounded_fetch;
use estatelytics_server::providers::http::{build_client, RetryPolicy};
use estatelytics_server::providers::{EdgeProvider, WebTrafficProvider};
use estatelytics_server::state::AppState;

const TOKEN: &str = "test-token";

async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn fast_retry(retries: u32) -> RetryPolicy {
    RetryPolicy {
        retries,
        backoff: Duration::from_millis(10),
    }
}

fn fixed_window() -> TimeWindow {
    TimeWindow::resolve_at(
        RangeKind::Last7Days,
        NaiveDate::from_ymd_opt(2026, 10, 7).expect("date"),
    )
}

fn web_provider(addr: SocketAddr, retries: u32) -> WebTrafficProvider {
    let client = build_client(Duration::from_secs(2)).expect("client");
    WebTrafficProvider::new(
        client,
        WebTrafficConfig {
            property_id: Some("123".to_string()),
            credentials_json: None,
            access_token: Some(TOKEN.to_string()),
            api_base: format!("http://{addr}"),
        },
        fast_retry(retries),
    )
}

fn edge_provider(addr: SocketAddr) -> EdgeProvider {
    let client = build_client(Duration::from_secs(2)).expect("client");
    EdgeProvider::new(
        client,
        EdgeConfig {
            api_token: Some(TOKEN.to_string()),
            zone_id: Some("zone123".to_string()),
            api_base: format!("http://{addr}"),
        },
        fast_retry(0),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn metric_headers(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|n| json!({ "name": n })).collect())
}

fn cells(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|v| json!({ "value": v })).collect())
}

/// A GA batch response with daily rows on `days`.
fn ga_batch(days: &[NaiveDate]) -> Value {
    let rows: Vec<Value> = days
        .iter()
        .map(|d| {
            let day = d.format("%Y%m%d").to_string();
            json!({
                "dimensionValues": cells(&[day.as_str()]),
                "metricValues": cells(&["40", "12", "15", "5"]),
            })
        })
        .collect();
    json!({
        "reports": [
            {
                "dimensionHeaders": [{ "name": "date" }],
                "metricHeaders": metric_headers(&["screenPageViews", "activeUsers", "sessions", "newUsers"]),
                "rows": rows
            },
            {
                "dimensionHeaders": [{ "name": "dateRange" }],
                "metricHeaders": metric_headers(&[
                    "screenPageViews", "activeUsers", "sessions", "newUsers",
                    "bounceRate", "averageSessionDuration"
                ]),
                "rows": [
                    { "dimensionValues": cells(&["current"]),
                      "metricValues": cells(&["80", "20", "30", "10", "0.5", "125"]) },
                    { "dimensionValues": cells(&["previous"]),
                      "metricValues": cells(&["40", "10", "20", "5", "0.25", "100"]) }
                ]
            },
            {
                "dimensionHeaders": [{ "name": "pagePath" }],
                "metricHeaders": metric_headers(&["screenPageViews"]),
                "rows": [{ "dimensionValues": cells(&["/listings"]), "metricValues": cells(&["60"]) }]
            },
            { "dimensionHeaders": [{ "name": "sessionDefaultChannelGroup" }],
              "metricHeaders": metric_headers(&["sessions"]) },
            { "dimensionHeaders": [{ "name": "deviceCategory" }],
              "metricHeaders": metric_headers(&["activeUsers"]) }
        ]
    })
}

fn fixed_days() -> Vec<NaiveDate> {
    vec![
        NaiveDate::from_ymd_opt(2026, 10, 2).expect("date"),
        NaiveDate::from_ymd_opt(2026, 10, 7).expect("date"),
    ]
}

async fn ga_ok(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthenticated" })));
    }
    (StatusCode::OK, Json(ga_batch(&fixed_days())))
}

#[tokio::test]
async fn web_provider_translates_batch_report() {
    let addr = spawn_upstream(Router::new().route("/properties/{call}", post(ga_ok))).await;
    let result = web_provider(addr, 0).fetch(&fixed_window()).await;

    assert!(result.available, "error: {:?}", result.error);
    assert_eq!(result.series.len(), 7);
    assert_eq!(result.series[1].metric("views"), Some(40.0));
    assert_eq!(result.series[2].metric("views"), Some(0.0));
    assert_eq!(result.total("visitors"), Some(20.0));
    assert_eq!(result.total("bounce_rate"), Some(50.0));
    assert_eq!(result.previous_total("sessions"), Some(20.0));
    assert_eq!(result.breakdowns["top_pages"][0].label, "/listings");
    assert!(!result.breakdowns.contains_key("devices"));
}

async fn flaky(State(calls): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "busy" })));
    }
    (StatusCode::OK, Json(ga_batch(&fixed_days())))
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/properties/{call}", post(flaky))
        .with_state(Arc::clone(&calls));
    let addr = spawn_upstream(app).await;

    let result = web_provider(addr, 2).fetch(&fixed_window()).await;
    assert!(result.available);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

async fn always_unauthorized(State(calls): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, "token expired")
}

#[tokio::test]
async fn auth_failures_are_unreachable_and_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/properties/{call}", post(always_unauthorized))
        .with_state(Arc::clone(&calls));
    let addr = spawn_upstream(app).await;

    let result = web_provider(addr, 2).fetch(&fixed_window()).await;
    assert!(!result.available);
    assert_eq!(result.error, Some(ErrorKind::ProviderUnreachable));
    assert!(result.series.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn garbage_bodies_are_malformed() {
    let app = Router::new().route(
        "/properties/{call}",
        post(|| async { (StatusCode::OK, "<html>maintenance</html>") }),
    );
    let addr = spawn_upstream(app).await;

    let result = web_provider(addr, 0).fetch(&fixed_window()).await;
    assert!(!result.available);
    assert_eq!(result.error, Some(ErrorKind::ProviderMalformedResponse));
}

#[tokio::test]
async fn unconfigured_provider_never_calls_upstream() {
    let client = build_client(Duration::from_secs(1)).expect("client");
    let provider = WebTrafficProvider::new(client, WebTrafficConfig::default(), fast_retry(0));
    assert!(!provider.is_configured());

    let result = provider.fetch(&fixed_window()).await;
    assert!(!result.available);
    assert_eq!(result.error, Some(ErrorKind::ProviderUnconfigured));
}

async fn cf_graphql(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) || body["variables"]["zoneTag"] != "zone123" {
        return Json(json!({ "data": null, "errors": [{ "message": "zone not found" }] }));
    }
    Json(json!({
        "data": { "viewer": { "zones": [{
            "series": [
                { "dimensions": { "date": "2026-10-06" },
                  "sum": { "requests": 400, "cachedRequests": 300, "bytes": 1048576,
                           "cachedBytes": 524288, "threats": 1, "pageViews": 90 },
                  "uniq": { "uniques": 25 } }
            ],
            "current": [
                { "sum": { "requests": 400, "cachedRequests": 300, "bytes": 1048576,
                           "cachedBytes": 524288, "threats": 1, "pageViews": 90,
                           "countryMap": [{ "clientCountryName": "PT", "requests": 400 }],
                           "responseStatusMap": [] },
                  "uniq": { "uniques": 25 } }
            ],
            "previous": []
        }]}},
        "errors": null
    }))
}

#[tokio::test]
async fn edge_provider_translates_graphql_groups() {
    let addr = spawn_upstream(Router::new().route("/graphql", post(cf_graphql))).await;
    let result = edge_provider(addr).fetch(&fixed_window()).await;

    assert!(result.available, "error: {:?}", result.error);
    assert_eq!(result.series.len(), 7);
    assert_eq!(result.series[5].metric("cached_requests"), Some(300.0));
    assert_eq!(result.total("visitors"), Some(25.0));
    assert_eq!(result.previous_total("requests"), Some(0.0));
    assert_eq!(result.breakdowns["countries"][0].label, "PT");
    assert!(!result.breakdowns.contains_key("status_codes"));
}

#[tokio::test]
async fn slow_upstream_is_bounded() {
    let app = Router::new().route(
        "/graphql",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(json!({}))
        }),
    );
    let addr = spawn_upstream(app).await;
    let provider = edge_provider(addr);

    let started = std::time::Instant::now();
    let result = bounded_fetch(&provider, &fixed_window(), Duration::from_millis(100)).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.available);
    assert_eq!(result.error, Some(ErrorKind::ProviderUnreachable));
}

async fn ga_today(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let today = Utc::now().date_naive();
    (StatusCode::OK, Json(ga_batch(&[today])))
}

#[tokio::test]
async fn report_endpoint_prefers_live_web_series() {
    let ga = spawn_upstream(Router::new().route("/properties/{call}", post(ga_today))).await;
    let cf = spawn_upstream(Router::new().route("/graphql", post(cf_graphql))).await;

    let config = Config {
        port: 0,
        data_dir: "/tmp/estatelytics-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        cors_origins: vec![],
        provider_timeout_ms: 2_000,
        provider_retries: 0,
        report_timeout_ms: 5_000,
        web_traffic: WebTrafficConfig {
            property_id: Some("properties/123".to_string()),
            credentials_json: None,
            access_token: Some(TOKEN.to_string()),
            api_base: format!("http://{ga}"),
        },
        edge: EdgeConfig {
            api_token: Some(TOKEN.to_string()),
            zone_id: Some("zone123".to_string()),
            api_base: format!("http://{cf}"),
        },
    };
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, config).expect("state")));

    let request = Request::builder()
        .uri("/api/reports/marketing?range=7d")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let json: Value = serde_json::from_slice(&bytes).expect("parse JSON");
    let report = &json["data"];

    assert_eq!(report["series_source"], "web_traffic");
    let series = report["primary_series"].as_array().expect("series");
    assert_eq!(series.len(), 7);
    assert_eq!(series[6]["metrics"]["views"], 40.0);
    assert_eq!(report["source_availability"]["web"], true);
    assert_eq!(report["source_availability"]["edge"], true);
    assert_eq!(report["kpis"]["bounce_rate"]["value"], 50.0);
    assert_eq!(report["kpis"]["avg_session_duration"]["value"], "2m 05s");
    assert!(report["kpis"].get("cache_hit_rate").is_some());
    assert_eq!(report["breakdowns"]["web.top_pages"][0]["label"], "/listings");
}
