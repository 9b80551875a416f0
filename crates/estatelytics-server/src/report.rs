use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use estatelytics_core::aggregate::aggregate;
use estatelytics_core::funnel::{FunnelCounterReader, InternalCounts};
use estatelytics_core::provider::AnalyticsProvider;
use estatelytics_core::report::UnifiedReport;
use estatelytics_core::window::TimeWindow;

use crate::providers::bounded_fetch;

/// Gathers every input of a marketing report concurrently and reconciles them.
#[derive(Clone)]
pub struct ReportEngine {
    reader: Arc<dyn FunnelCounterReader>,
    web: Arc<dyn AnalyticsProvider>,
    edge: Arc<dyn AnalyticsProvider>,
    provider_timeout: Duration,
}

impl ReportEngine {
    pub fn new(
        reader: Arc<dyn FunnelCounterReader>,
        web: Arc<dyn AnalyticsProvider>,
        edge: Arc<dyn AnalyticsProvider>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            web,
            edge,
            provider_timeout,
        }
    }

    pub fn web(&self) -> &dyn AnalyticsProvider {
        self.web.as_ref()
    }

    pub fn edge(&self) -> &dyn AnalyticsProvider {
        self.edge.as_ref()
    }

    /// Build the report for `window`.
    ///
    /// Provider failures never fail the build. A failure reading the current
    /// window's internal counters does, and the handler answers it with a 500
    /// even though only range/window validation is otherwise a request error:
    /// a report without any first-party counts would be misleading. A failed
    /// previous-window read just drops the deltas.
    pub async fn build(&self, window: &TimeWindow) -> anyhow::Result<UnifiedReport> {
        let previous_window = window.previous();
        let (current, previous, web, edge) = tokio::join!(
            self.reader.get_funnel_counts(window),
            self.reader.get_funnel_counts(&previous_window),
            bounded_fetch(self.web.as_ref(), window, self.provider_timeout),
            bounded_fetch(self.edge.as_ref(), window, self.provider_timeout),
        );

        let current = current?;
        let previous = match previous {
            Ok(counts) => Some(counts),
            Err(e) => {
                warn!(error = %e, "previous-window counters unavailable, deltas omitted");
                None
            }
        };
        debug!(
            days = window.days,
            web = web.available,
            edge = edge.available,
            "report inputs gathered"
        );

        Ok(aggregate(
            window,
            &InternalCounts::new(current, previous),
            &web,
            &edge,
        ))
    }
}
