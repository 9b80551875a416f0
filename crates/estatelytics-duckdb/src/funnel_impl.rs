use async_trait::async_trait;

use estatelytics_core::funnel::{FunnelCounterReader, FunnelCounts};
use estatelytics_core::window::TimeWindow;

use crate::DuckDbBackend;

#[async_trait]
impl FunnelCounterReader for DuckDbBackend {
    async fn get_funnel_counts(&self, window: &TimeWindow) -> anyhow::Result<FunnelCounts> {
        crate::queries::funnel_counts::get_funnel_counts_inner(self, window).await
    }
}
