//! ZeroSSL external-account-binding credential fetch
//!
//! ZeroSSL requires every ACME account to be bound to an out-of-band
//! identity via EAB. When a service resolves to the ZeroSSL CA and no
//! static credential is configured, the account manager fetches one
//! credential pair from the ZeroSSL API using the configured API key.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// ZeroSSL production ACME directory URL
pub const ZEROSSL_CA: &str = "https://acme.zerossl.com/v2/DV90";

/// ZeroSSL EAB credential-issuance endpoint
pub const ZEROSSL_EAB_ENDPOINT: &str = "https://api.zerossl.com/acme/eab-credentials";

/// An external-account-binding credential pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EabCredential {
    /// Key identifier
    pub kid: String,
    /// Base64url-encoded HMAC key
    pub hmac_key: String,
}

/// Errors from the credential fetch
#[derive(Debug, Error)]
pub enum ZeroSslError {
    /// HTTP transport failure
    #[error("ZeroSSL request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API reported failure
    #[error("ZeroSSL rejected the EAB credential request")]
    Rejected,

    /// Success response missing credential fields
    #[error("ZeroSSL response missing EAB credential fields")]
    MissingFields,
}

#[derive(Debug, Deserialize)]
struct EabResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    eab_kid: Option<String>,
    #[serde(default)]
    eab_hmac_key: Option<String>,
}

/// Whether a CA URI belongs to ZeroSSL
pub fn is_zerossl_ca(ca_uri: &str) -> bool {
    ca_uri == ZEROSSL_CA
        || url::Url::parse(ca_uri)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.ends_with("zerossl.com")))
            .unwrap_or(false)
}

/// Client for the ZeroSSL credential-issuance API
#[derive(Debug, Clone)]
pub struct ZeroSslClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ZeroSslClient {
    /// Create a client against the production endpoint
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: ZEROSSL_EAB_ENDPOINT.to_string(),
        }
    }

    /// Create a client against a specific endpoint
    #[doc(hidden)]
    pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch one EAB credential pair using the account-level API key
    pub async fn fetch_eab_credentials(&self, api_key: &str) -> Result<EabCredential, ZeroSslError> {
        debug!("Requesting EAB credentials from ZeroSSL");

        let response: EabResponse = self
            .http
            .post(&self.endpoint)
            .query(&[("access_key", api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            return Err(ZeroSslError::Rejected);
        }

        let (kid, hmac_key) = match (response.eab_kid, response.eab_hmac_key) {
            (Some(kid), Some(hmac_key)) => (kid, hmac_key),
            _ => return Err(ZeroSslError::MissingFields),
        };

        info!(kid = %kid, "Fetched EAB credentials from ZeroSSL");
        Ok(EabCredential { kid, hmac_key })
    }
}

impl Default for ZeroSslClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}
