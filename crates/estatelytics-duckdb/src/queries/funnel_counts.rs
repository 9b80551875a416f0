use anyhow::Result;
use chrono::Duration;

use estatelytics_core::funnel::FunnelCounts;
use estatelytics_core::window::TimeWindow;

use crate::DuckDbBackend;

/// Every counter in one statement. `?1` is the inclusive lower bound (first
/// covered day, midnight) and `?2` the exclusive upper bound (day after
/// `end`, midnight).
const FUNNEL_COUNTS_SQL: &str = r#"
SELECT
    (SELECT COUNT(DISTINCT visitor_id) FROM page_views
        WHERE created_at >= ?1 AND created_at < ?2) AS visitors,
    (SELECT COUNT(*) FROM users
        WHERE created_at >= ?1 AND created_at < ?2) AS registered_users,
    (SELECT COUNT(DISTINCT user_id) FROM (
        SELECT user_id FROM wishlist_actions
            WHERE created_at >= ?1 AND created_at < ?2
        UNION ALL
        SELECT user_id FROM saved_searches
            WHERE created_at >= ?1 AND created_at < ?2
        UNION ALL
        SELECT user_id FROM leads
            WHERE user_id IS NOT NULL AND created_at >= ?1 AND created_at < ?2
    )) AS engaged_users,
    (SELECT COUNT(*) FROM leads
        WHERE created_at >= ?1 AND created_at < ?2) AS inquiries,
    (SELECT COUNT(*) FROM bookings
        WHERE created_at >= ?1 AND created_at < ?2) AS bookings,
    (SELECT COUNT(*) FROM wishlist_actions
        WHERE created_at >= ?1 AND created_at < ?2) AS wishlist_actions,
    (SELECT COUNT(*) FROM saved_searches
        WHERE created_at >= ?1 AND created_at < ?2) AS saved_searches
"#;

fn to_count(raw: i64) -> u64 {
    raw.max(0) as u64
}

pub async fn get_funnel_counts_inner(
    db: &DuckDbBackend,
    window: &TimeWindow,
) -> Result<FunnelCounts> {
    let conn = db.conn.lock().await;

    let start_str = window.first_day().format("%Y-%m-%d").to_string();
    let end_next = window.end + Duration::days(1);
    let end_str = end_next.format("%Y-%m-%d").to_string();

    let mut stmt = conn.prepare(FUNNEL_COUNTS_SQL)?;
    let counts = stmt.query_row(duckdb::params![start_str, end_str], |row| {
        Ok(FunnelCounts {
            visitors: to_count(row.get(0)?),
            registered_users: to_count(row.get(1)?),
            engaged_users: to_count(row.get(2)?),
            inquiries: to_count(row.get(3)?),
            bookings: to_count(row.get(4)?),
            wishlist_actions: to_count(row.get(5)?),
            saved_searches: to_count(row.get(6)?),
        })
    })?;

    Ok(counts)
}
