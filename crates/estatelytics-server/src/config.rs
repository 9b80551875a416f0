/// Re-export `Config` from `estatelytics-core` for use within this crate.
///
/// All environment-variable parsing lives in `estatelytics-core` so it can be
/// shared with integration tests without depending on the full server.
pub use estatelytics_core::config::{Config, EdgeConfig, WebTrafficConfig};
