use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use estatelytics_server::state::AppState;

/// `estatelytics health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$ESTATELYTICS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("ESTATELYTICS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("estatelytics=info".parse()?),
        )
        .json()
        .init();

    let cfg = estatelytics_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/estatelytics.db", cfg.data_dir);
    let db = estatelytics_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    if cfg.web_traffic.is_configured() {
        info!("Web-traffic provider configured");
    } else {
        info!(
            "Web-traffic provider not configured (set ESTATELYTICS_GA_PROPERTY_ID and \
             ESTATELYTICS_GA_CREDENTIALS or ESTATELYTICS_GA_ACCESS_TOKEN)"
        );
    }
    if cfg.edge.is_configured() {
        info!("Edge provider configured");
    } else {
        info!(
            "Edge provider not configured (set ESTATELYTICS_CF_API_TOKEN and ESTATELYTICS_CF_ZONE_ID)"
        );
    }

    let state = Arc::new(AppState::new(db, cfg.clone())?);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = estatelytics_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "Estatelytics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
