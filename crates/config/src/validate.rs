//! Settings validation
//!
//! Checks loaded settings for values that would make every cycle fail,
//! so misconfiguration surfaces at startup instead of mid-issuance.

use thiserror::Error;
use url::Url;

use crate::Settings;

/// A configuration value that cannot be used
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A CA URI is not a usable absolute URL
    #[error("invalid CA URI '{uri}': {reason}")]
    CaUri { uri: String, reason: String },

    /// The DNS provider block is malformed
    #[error("invalid DNS config: {0}")]
    DnsConfig(String),

    /// EAB credentials are half-configured
    #[error("default EAB credentials require both kid and HMAC key")]
    PartialEab,

    /// Standalone service declarations are not valid JSON
    #[error("invalid standalone service declarations: {0}")]
    StandaloneServices(String),
}

impl Settings {
    /// Validate loaded settings
    ///
    /// Returns the first fatal problem found. Run by the `--test` CLI
    /// mode and before the daemon's first cycle.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_ca_uri(&self.ca_uri)?;
        check_ca_uri(&self.staging_ca_uri)?;

        if self.default_eab_kid.is_some() != self.default_eab_hmac_key.is_some() {
            return Err(ValidationError::PartialEab);
        }

        // Surfaces DNS_API omissions before any service hits DNS-01
        self.default_dns()?;

        if let Some(raw) = &self.standalone_services {
            serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|e| ValidationError::StandaloneServices(e.to_string()))?;
        }

        Ok(())
    }
}

fn check_ca_uri(uri: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(uri).map_err(|e| ValidationError::CaUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.host_str().is_none() {
        return Err(ValidationError::CaUri {
            uri: uri.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(())
}
