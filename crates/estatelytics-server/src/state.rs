use std::sync::Arc;

use estatelytics_core::funnel::FunnelCounterReader;
use estatelytics_core::provider::AnalyticsProvider;
use estatelytics_duckdb::DuckDbBackend;

use crate::config::Config;
use crate::providers::http::{build_client, RetryPolicy};
use crate::providers::{EdgeProvider, WebTrafficProvider};
use crate::report::ReportEngine;

/// Shared application state injected into every Axum handler via
/// `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Arc<DuckDbBackend>,
    pub config: Config,
    pub engine: ReportEngine,
}

impl AppState {
    /// Wire the DuckDB reader and both HTTP provider adapters from `config`.
    pub fn new(db: DuckDbBackend, config: Config) -> anyhow::Result<Self> {
        let client = build_client(config.provider_timeout())?;
        let retry = RetryPolicy::new(config.provider_retries);
        let web: Arc<dyn AnalyticsProvider> = Arc::new(WebTrafficProvider::new(
            client.clone(),
            config.web_traffic.clone(),
            retry,
        ));
        let edge: Arc<dyn AnalyticsProvider> =
            Arc::new(EdgeProvider::new(client, config.edge.clone(), retry));
        Ok(Self::with_providers(db, config, web, edge))
    }

    /// Same as [`AppState::new`] with caller-supplied provider adapters.
    pub fn with_providers(
        db: DuckDbBackend,
        config: Config,
        web: Arc<dyn AnalyticsProvider>,
        edge: Arc<dyn AnalyticsProvider>,
    ) -> Self {
        let db = Arc::new(db);
        let reader: Arc<dyn FunnelCounterReader> = db.clone();
        let engine = ReportEngine::new(reader, web, edge, config.provider_timeout());
        Self { db, config, engine }
    }
}
