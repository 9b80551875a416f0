//! OAuth access tokens for the Google Analytics Data API.
//!
//! Service-account keys are exchanged with the JWT bearer grant: an RS256
//! assertion signed with the key's private key is posted to its `token_uri`.
//! Tokens are not cached; every report request obtains a fresh one.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use estatelytics_core::error::ProviderError;

use super::http::{decode_json, send_with_retry, RetryPolicy};

pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccountKey),
}

impl TokenSource {
    /// Pick a token source from configuration. A static token wins.
    ///
    /// Unparseable key JSON counts as missing configuration.
    pub fn from_config(
        access_token: Option<&str>,
        credentials_json: Option<&str>,
    ) -> Result<Self, ProviderError> {
        if let Some(token) = access_token {
            return Ok(TokenSource::Static(token.to_string()));
        }
        let raw = credentials_json.ok_or_else(|| {
            ProviderError::Unconfigured("no access token or service-account key".to_string())
        })?;
        let key: ServiceAccountKey = serde_json::from_str(raw).map_err(|e| {
            ProviderError::Unconfigured(format!("service-account key is not valid JSON: {e}"))
        })?;
        Ok(TokenSource::ServiceAccount(key))
    }

    pub async fn access_token(
        &self,
        client: &Client,
        policy: RetryPolicy,
    ) -> Result<String, ProviderError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(key) => exchange_assertion(client, policy, key).await,
        }
    }
}

pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, ProviderError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: ANALYTICS_READONLY_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        ProviderError::Unconfigured(format!("service-account private key rejected: {e}"))
    })?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| ProviderError::Unconfigured(format!("assertion signing failed: {e}")))
}

async fn exchange_assertion(
    client: &Client,
    policy: RetryPolicy,
    key: &ServiceAccountKey,
) -> Result<String, ProviderError> {
    let assertion = sign_assertion(key, Utc::now().timestamp())?;
    let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
    let resp = send_with_retry("web", policy, || client.post(&key.token_uri).form(&form)).await?;
    let token: TokenResponse = decode_json("web", resp).await?;
    Ok(token.access_token)
}
