use std::time::Duration;

pub const DEFAULT_GA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
pub const DEFAULT_CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB size string such as `"1GB"`.
    pub duckdb_memory_limit: String,
    pub cors_origins: Vec<String>,
    pub provider_timeout_ms: u64,
    /// Extra attempts after a transient provider failure.
    pub provider_retries: u32,
    pub report_timeout_ms: u64,
    pub web_traffic: WebTrafficConfig,
    pub edge: EdgeConfig,
}

/// Web-traffic analytics (Google Analytics Data API) settings.
///
/// Every credential is optional: a missing value leaves the provider
/// unconfigured for the lifetime of the process.
#[derive(Clone, Default)]
pub struct WebTrafficConfig {
    pub property_id: Option<String>,
    /// Service-account key JSON, inline or loaded from
    /// `ESTATELYTICS_GA_CREDENTIALS_FILE`.
    pub credentials_json: Option<String>,
    /// Pre-issued OAuth access token. Takes precedence over the service account.
    pub access_token: Option<String>,
    pub api_base: String,
}

impl WebTrafficConfig {
    pub fn is_configured(&self) -> bool {
        self.property_id.is_some() && (self.access_token.is_some() || self.credentials_json.is_some())
    }
}

impl std::fmt::Debug for WebTrafficConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebTrafficConfig")
            .field("property_id", &self.property_id)
            .field("credentials_json", &self.credentials_json.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Edge/CDN analytics (Cloudflare GraphQL) settings.
#[derive(Clone, Default)]
pub struct EdgeConfig {
    pub api_token: Option<String>,
    pub zone_id: Option<String>,
    pub api_base: String,
}

impl EdgeConfig {
    pub fn is_configured(&self) -> bool {
        self.api_token.is_some() && self.zone_id.is_some()
    }
}

impl std::fmt::Debug for EdgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Read a variable, treating blank values as absent.
fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("ESTATELYTICS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("ESTATELYTICS_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("ESTATELYTICS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("ESTATELYTICS_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            provider_timeout_ms: std::env::var("ESTATELYTICS_PROVIDER_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),
            provider_retries: std::env::var("ESTATELYTICS_PROVIDER_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            report_timeout_ms: std::env::var("ESTATELYTICS_REPORT_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000),
            web_traffic: WebTrafficConfig {
                property_id: non_empty_var("ESTATELYTICS_GA_PROPERTY_ID"),
                credentials_json: non_empty_var("ESTATELYTICS_GA_CREDENTIALS").or_else(|| {
                    let path = non_empty_var("ESTATELYTICS_GA_CREDENTIALS_FILE")?;
                    match std::fs::read_to_string(&path) {
                        Ok(contents) => Some(contents),
                        Err(e) => {
                            tracing::warn!(
                                path = %path,
                                error = %e,
                                "GA credentials file unreadable; web-traffic provider stays unconfigured"
                            );
                            None
                        }
                    }
                }),
                access_token: non_empty_var("ESTATELYTICS_GA_ACCESS_TOKEN"),
                api_base: non_empty_var("ESTATELYTICS_GA_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GA_API_BASE.to_string()),
            },
            edge: EdgeConfig {
                api_token: non_empty_var("ESTATELYTICS_CF_API_TOKEN"),
                zone_id: non_empty_var("ESTATELYTICS_CF_ZONE_ID"),
                api_base: non_empty_var("ESTATELYTICS_CF_API_BASE")
                    .unwrap_or_else(|| DEFAULT_CF_API_BASE.to_string()),
            },
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}
