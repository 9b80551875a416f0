use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use estatelytics_core::provider::AnalyticsProvider;

use crate::state::AppState;

fn describe(provider: &dyn AnalyticsProvider) -> serde_json::Value {
    json!({
        "id": provider.provider_id(),
        "configured": provider.is_configured(),
    })
}

/// `GET /api/providers` — which external providers have credentials.
///
/// Answers from configuration alone; no upstream is contacted.
#[tracing::instrument(skip(state))]
pub async fn list_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "data": [describe(state.engine.web()), describe(state.engine.edge())]
    }))
}
