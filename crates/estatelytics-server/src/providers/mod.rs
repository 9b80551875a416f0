//! External analytics provider adapters.
//!
//! Each adapter turns its upstream's native response into a
//! [`ProviderResult`]. Failures never escape `fetch`: they are logged here and
//! folded into `available = false` with an error kind.

use std::time::Duration;

use tracing::{debug, error, warn};

use estatelytics_core::error::{ErrorKind, ProviderError};
use estatelytics_core::provider::AnalyticsProvider;
use estatelytics_core::report::ProviderResult;
use estatelytics_core::window::TimeWindow;

pub mod edge;
pub mod google_auth;
pub mod http;
pub mod web_traffic;

pub use edge::EdgeProvider;
pub use web_traffic::WebTrafficProvider;

/// Log a provider failure at the severity its kind warrants.
///
/// Unconfigured is an expected steady state, unreachable is transient, and a
/// malformed response usually means the upstream schema changed.
pub fn log_provider_error(provider: &'static str, err: &ProviderError) {
    match err.kind() {
        ErrorKind::ProviderUnconfigured => {
            debug!(provider, error = %err, "provider not configured, skipping")
        }
        ErrorKind::ProviderUnreachable => {
            warn!(provider, error = %err, "provider unreachable")
        }
        ErrorKind::ProviderMalformedResponse => {
            error!(provider, error = %err, "provider returned a malformed response")
        }
    }
}

/// Convert an adapter's internal outcome into the boundary type.
pub fn into_result(
    provider: &'static str,
    outcome: Result<ProviderResult, ProviderError>,
) -> ProviderResult {
    match outcome {
        Ok(result) => result,
        Err(err) => {
            log_provider_error(provider, &err);
            ProviderResult::from_error(provider, &err)
        }
    }
}

/// Run `provider.fetch` with a hard deadline covering every retry.
pub async fn bounded_fetch(
    provider: &dyn AnalyticsProvider,
    window: &TimeWindow,
    timeout: Duration,
) -> ProviderResult {
    let id = provider.provider_id();
    match tokio::time::timeout(timeout, provider.fetch(window)).await {
        Ok(result) => result,
        Err(_) => {
            let err = ProviderError::Unreachable(format!(
                "{id} did not answer within {}ms",
                timeout.as_millis()
            ));
            log_provider_error(id, &err);
            ProviderResult::from_error(id, &err)
        }
    }
}
