//! Daemon settings loaded from the environment
//!
//! Every option is read once at startup from `CERTKEEPER_`-prefixed
//! environment variables and defaulted to a usable value, so a bare
//! `certkeeper` invocation against a standard layout works with no
//! configuration at all.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::{ConfigError, ValidationError};

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Minimum reconciliation interval (seconds)
const MIN_UPDATE_INTERVAL_SECS: u64 = 60;

fn default_update_interval() -> u64 {
    3600
}

fn default_ca_uri() -> String {
    LETSENCRYPT_PRODUCTION.to_string()
}

fn default_staging_ca_uri() -> String {
    LETSENCRYPT_STAGING.to_string()
}

fn default_key_size() -> String {
    "ec-256".to_string()
}

fn default_renew_days() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("/etc/certkeeper/certs")
}

fn default_acme_home() -> PathBuf {
    PathBuf::from("/etc/acme.sh")
}

fn default_acme_bin() -> PathBuf {
    PathBuf::from("acme.sh")
}

fn default_webroot() -> PathBuf {
    PathBuf::from("/usr/share/nginx/html")
}

fn default_user_agent() -> String {
    format!("certkeeper/{}", env!("CARGO_PKG_VERSION"))
}

/// Immutable daemon configuration
///
/// Deserialized from `CERTKEEPER_*` environment variables via [`envy`].
/// Per-service overrides from the service metadata feed take precedence
/// over the defaults recorded here.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Default ACME directory URL
    #[serde(default = "default_ca_uri")]
    pub ca_uri: String,

    /// ACME directory URL used when a service sets the test flag
    #[serde(default = "default_staging_ca_uri")]
    pub staging_ca_uri: String,

    /// Default key size label (`ec-256`, `ec-384`, `2048`, `3072`, `4096`)
    #[serde(default = "default_key_size")]
    pub default_key_size: String,

    /// Renewal window passed to the ACME client (`--days`)
    #[serde(default = "default_renew_days")]
    pub renew_days: u32,

    /// Reuse private keys across reissues instead of regenerating
    #[serde(default)]
    pub reuse_private_keys: bool,

    /// Default account email when a service declares none
    #[serde(default)]
    pub default_email: Option<String>,

    /// Default external-account-binding key id
    #[serde(default)]
    pub default_eab_kid: Option<String>,

    /// Default external-account-binding HMAC key
    #[serde(default)]
    pub default_eab_hmac_key: Option<String>,

    /// ZeroSSL API key for dynamic EAB credential fetch
    #[serde(default)]
    pub zerossl_api_key: Option<String>,

    /// Default DNS provider block: newline-delimited `KEY=VALUE` pairs,
    /// must contain `DNS_API`
    #[serde(default)]
    pub default_dns_config: Option<String>,

    /// Default pre-issuance hook command
    #[serde(default)]
    pub default_pre_hook: Option<String>,

    /// Default post-issuance hook command
    #[serde(default)]
    pub default_post_hook: Option<String>,

    /// Alternate trust-store bundle handed to the ACME client
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,

    /// Coalesce proxy reloads to one per cycle; when false, every
    /// service change reloads the proxy immediately
    #[serde(default = "default_true")]
    pub coalesce_reloads: bool,

    /// Certificate directory holding bundles and aliases
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// ACME client config home (account and key storage)
    #[serde(default = "default_acme_home")]
    pub acme_home: PathBuf,

    /// External ACME client binary
    #[serde(default = "default_acme_bin")]
    pub acme_bin: PathBuf,

    /// Webroot served for HTTP-01 challenges
    #[serde(default = "default_webroot")]
    pub webroot: PathBuf,

    /// Drop-in directory for per-domain challenge-location snippets;
    /// unset when the proxy serves the challenge path natively
    #[serde(default)]
    pub challenge_location_dir: Option<PathBuf>,

    /// JSON file maintained by the service runtime integration,
    /// holding the declared service-to-domain mappings
    #[serde(default)]
    pub services_file: Option<PathBuf>,

    /// Command template for restarting a service; `{id}` is substituted
    #[serde(default)]
    pub restart_cmd: Option<String>,

    /// Command that exits zero when the proxy is up
    #[serde(default)]
    pub proxy_check_cmd: Option<String>,

    /// Command that reloads the proxy configuration
    #[serde(default)]
    pub proxy_reload_cmd: Option<String>,

    /// JSON array of standalone service declarations
    #[serde(default)]
    pub standalone_services: Option<String>,

    /// User agent reported to the ACME client
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        // envy with an empty environment yields every serde default
        envy::prefixed("__CERTKEEPER_UNSET_")
            .from_env()
            .expect("default settings are always deserializable")
    }
}

impl Settings {
    /// Load settings from `CERTKEEPER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings: Settings = envy::prefixed("CERTKEEPER_").from_env()?;

        if settings.update_interval_secs < MIN_UPDATE_INTERVAL_SECS {
            warn!(
                requested = settings.update_interval_secs,
                clamped = MIN_UPDATE_INTERVAL_SECS,
                "Update interval below minimum, clamping"
            );
            settings.update_interval_secs = MIN_UPDATE_INTERVAL_SECS;
        }

        Ok(settings)
    }

    /// Whether a CA URI selects the staging environment
    ///
    /// Matches the configured staging URI exactly, or any Let's Encrypt
    /// staging endpoint a service may have set directly.
    pub fn is_staging_uri(&self, ca_uri: &str) -> bool {
        ca_uri == self.staging_ca_uri || ca_uri.contains("acme-staging")
    }

    /// Parse the default DNS provider block, if any
    pub fn default_dns(&self) -> Result<Option<DnsConfig>, ValidationError> {
        self.default_dns_config
            .as_deref()
            .map(DnsConfig::parse)
            .transpose()
    }
}

/// DNS provider configuration for DNS-01 challenges
///
/// The provider name is handed to the ACME client as its DNS hook and the
/// remaining pairs are exported into its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsConfig {
    /// Provider hook name (the `DNS_API` value, e.g. `dns_cf`)
    pub provider: String,
    /// Provider credential environment
    pub env: BTreeMap<String, String>,
}

impl DnsConfig {
    /// Parse a newline-delimited `KEY=VALUE` block
    ///
    /// The block must contain a `DNS_API` key naming the provider hook;
    /// every other pair becomes provider credential environment.
    pub fn parse(block: &str) -> Result<Self, ValidationError> {
        let mut provider = None;
        let mut env = BTreeMap::new();

        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ValidationError::DnsConfig(format!(
                    "expected KEY=VALUE, got '{line}'"
                )));
            };
            let key = key.trim();
            let value = value.trim();
            if key == "DNS_API" {
                provider = Some(value.to_string());
            } else {
                env.insert(key.to_string(), value.to_string());
            }
        }

        let provider = provider.ok_or_else(|| {
            ValidationError::DnsConfig("missing required DNS_API key".to_string())
        })?;

        Ok(Self { provider, env })
    }
}
