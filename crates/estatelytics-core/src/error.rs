use serde::Serialize;
use thiserror::Error;

/// Request-level failures. These are the only errors a report caller sees.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown range selector: {0}")]
    InvalidRangeKind(String),

    #[error("invalid window: {0}")]
    InvalidWindow(String),
}

/// Classification attached to an unavailable [`crate::report::ProviderResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderUnconfigured,
    ProviderUnreachable,
    ProviderMalformedResponse,
}

/// Failures inside a provider adapter.
///
/// Adapters convert these into an unavailable `ProviderResult`; they never
/// cross the adapter boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    Unconfigured(String),

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Unconfigured(_) => ErrorKind::ProviderUnconfigured,
            ProviderError::Unreachable(_) => ErrorKind::ProviderUnreachable,
            ProviderError::Malformed(_) => ErrorKind::ProviderMalformedResponse,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}
