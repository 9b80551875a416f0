/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every
/// statement uses `IF NOT EXISTS` so it is safe to re-run on each startup.
///
/// These tables are written by the lead, booking and property-interaction
/// services. This crate only reads them, always filtered on `created_at`.
///
/// Always set an explicit memory limit: the DuckDB default (80% of system
/// RAM) is not acceptable for a server process.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- TRAFFIC
-- ===========================================
CREATE TABLE IF NOT EXISTS page_views (
    id              VARCHAR PRIMARY KEY,
    visitor_id      VARCHAR NOT NULL,              -- anonymous browser id
    user_id         VARCHAR,                       -- NULL until the visitor signs in
    property_id     VARCHAR,                       -- NULL for non-listing pages
    path            VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_page_views_created ON page_views(created_at);

-- ===========================================
-- ACCOUNTS
-- ===========================================
CREATE TABLE IF NOT EXISTS users (
    id              VARCHAR PRIMARY KEY,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_users_created ON users(created_at);

-- ===========================================
-- FUNNEL ACTIONS
-- ===========================================
CREATE TABLE IF NOT EXISTS leads (
    id              VARCHAR PRIMARY KEY,
    user_id         VARCHAR,                       -- NULL for anonymous contact forms
    property_id     VARCHAR,
    source          VARCHAR,                       -- 'contact_form', 'phone', 'whatsapp', ...
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_leads_created ON leads(created_at);

CREATE TABLE IF NOT EXISTS bookings (
    id              VARCHAR PRIMARY KEY,
    lead_id         VARCHAR,
    user_id         VARCHAR,
    property_id     VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_bookings_created ON bookings(created_at);

CREATE TABLE IF NOT EXISTS wishlist_actions (
    id              VARCHAR PRIMARY KEY,
    user_id         VARCHAR NOT NULL,
    property_id     VARCHAR NOT NULL,
    action          VARCHAR NOT NULL,              -- 'add' | 'remove'
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_wishlist_created ON wishlist_actions(created_at);

CREATE TABLE IF NOT EXISTS saved_searches (
    id              VARCHAR PRIMARY KEY,
    user_id         VARCHAR NOT NULL,
    query           VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_saved_searches_created ON saved_searches(created_at);
"#
    )
}
