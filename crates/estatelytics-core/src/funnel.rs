//! Internal funnel counters and funnel-stage construction.

use serde::Serialize;

use crate::kpi::ratio_percent;
use crate::report::FunnelStage;
use crate::window::TimeWindow;

/// Aggregate first-party counters for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunnelCounts {
    pub visitors: u64,
    pub registered_users: u64,
    pub engaged_users: u64,
    pub inquiries: u64,
    pub bookings: u64,
    pub wishlist_actions: u64,
    pub saved_searches: u64,
}

/// Internal counters for the report window and, when readable, the window
/// before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternalCounts {
    pub current: FunnelCounts,
    pub previous: Option<FunnelCounts>,
}

impl InternalCounts {
    pub fn new(current: FunnelCounts, previous: Option<FunnelCounts>) -> Self {
        Self { current, previous }
    }
}

/// Reads funnel counters from the first-party store.
#[async_trait::async_trait]
pub trait FunnelCounterReader: Send + Sync + 'static {
    async fn get_funnel_counts(&self, window: &TimeWindow) -> anyhow::Result<FunnelCounts>;
}

pub const STAGE_VISITORS: &str = "Visitors";
pub const STAGE_REGISTERED: &str = "Registered";
pub const STAGE_ENGAGED: &str = "Engaged";
pub const STAGE_INQUIRIES: &str = "Inquiries";
pub const STAGE_BOOKINGS: &str = "Bookings";

/// Canonical funnel: Visitors → Registered → Engaged → Inquiries → Bookings.
///
/// Monotonic narrowing is expected of real data but not enforced here. A
/// stage larger than its predecessor reports a conversion above 100%.
pub fn build_funnel(counts: &FunnelCounts) -> Vec<FunnelStage> {
    let stages = [
        (STAGE_VISITORS, counts.visitors),
        (STAGE_REGISTERED, counts.registered_users),
        (STAGE_ENGAGED, counts.engaged_users),
        (STAGE_INQUIRIES, counts.inquiries),
        (STAGE_BOOKINGS, counts.bookings),
    ];

    let mut funnel = Vec::with_capacity(stages.len());
    let mut previous: Option<u64> = None;
    for (order, (name, count)) in stages.into_iter().enumerate() {
        let (conversion_rate, drop_off) = match previous {
            None => (None, 0),
            Some(prev) => (
                Some(ratio_percent(count as f64, prev as f64)),
                prev.saturating_sub(count),
            ),
        };
        funnel.push(FunnelStage {
            name: name.to_string(),
            count,
            order,
            conversion_rate,
            drop_off,
        });
        previous = Some(count);
    }
    funnel
}
