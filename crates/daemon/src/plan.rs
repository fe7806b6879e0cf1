//! Per-service issuance plan resolution
//!
//! Resolves a service's declared overrides against the global defaults
//! into an immutable [`IssuancePlan`]. Resolution failures are terminal
//! for that service's cycle only; the reconciliation loop continues with
//! the remaining services.

use certkeeper_config::{DnsConfig, Settings, ValidationError};
use thiserror::Error;
use tracing::warn;

use crate::service::Service;

/// Proof-of-control challenge type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeType {
    /// HTTP-01: token served from the proxy's webroot
    Http01,
    /// DNS-01: TXT record placed via a DNS provider hook
    Dns01,
}

impl ChallengeType {
    /// Parse a challenge type label (case-insensitive)
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "http-01" | "http01" => Some(Self::Http01),
            "dns-01" | "dns01" => Some(Self::Dns01),
            _ => None,
        }
    }
}

/// Certificate key size, from the fixed set the ACME client accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Ec256,
    Ec384,
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl KeySize {
    /// Parse a key size label; `None` for anything outside the fixed set
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ec-256" => Some(Self::Ec256),
            "ec-384" => Some(Self::Ec384),
            "2048" => Some(Self::Rsa2048),
            "3072" => Some(Self::Rsa3072),
            "4096" => Some(Self::Rsa4096),
            _ => None,
        }
    }

    /// The `--keylength` value handed to the ACME client
    pub fn as_keylength(&self) -> &'static str {
        match self {
            Self::Ec256 => "ec-256",
            Self::Ec384 => "ec-384",
            Self::Rsa2048 => "2048",
            Self::Rsa3072 => "3072",
            Self::Rsa4096 => "4096",
        }
    }
}

/// Plan resolution errors, terminal per service but never per cycle
#[derive(Debug, Error)]
pub enum PlanError {
    /// Challenge type label outside the known set
    #[error("unknown challenge type '{0}'")]
    UnknownChallenge(String),

    /// HTTP-01 cannot validate a wildcard identifier
    #[error("wildcard domain '{domain}' is incompatible with HTTP-01")]
    WildcardRequiresDns { domain: String },

    /// DNS-01 selected but neither the service nor the defaults carry a provider
    #[error("DNS-01 selected but no DNS provider is configured")]
    MissingDnsProvider,

    /// The service or global DNS provider block is malformed
    #[error(transparent)]
    DnsConfig(#[from] ValidationError),
}

/// Immutable issuance plan for one service's cycle
#[derive(Debug, Clone)]
pub struct IssuancePlan {
    /// Selected challenge type
    pub challenge: ChallengeType,
    /// DNS provider, present iff `challenge` is DNS-01
    pub dns: Option<DnsConfig>,
    /// Resolved key size
    pub key_size: KeySize,
    /// Request an OCSP-must-staple certificate
    pub ocsp_must_staple: bool,
    /// Preferred issuer chain selector
    pub preferred_chain: Option<String>,
    /// Pre-issuance hook command
    pub pre_hook: Option<String>,
    /// Post-issuance hook command
    pub post_hook: Option<String>,
    /// Resolved ACME directory URL
    pub ca_uri: String,
    /// Whether the resolved CA is the staging environment
    pub staging: bool,
    /// Resolved account email (service override, then global default)
    pub email: Option<String>,
    /// Service-level EAB key id
    pub eab_kid: Option<String>,
    /// Service-level EAB HMAC key
    pub eab_hmac_key: Option<String>,
    /// Whether this is a wildcard certificate
    pub wildcard: bool,
    /// Restart the owning service after renewal
    pub restart_on_renew: bool,
    /// Renewal window in days
    pub renew_days: u32,
    /// Reuse the private key across reissues
    pub reuse_key: bool,
}

/// Resolve a service's issuance plan against the global defaults
pub fn resolve_plan(service: &Service, settings: &Settings) -> Result<IssuancePlan, PlanError> {
    let overrides = &service.overrides;
    let wildcard = service.is_wildcard();

    let challenge = match overrides.challenge_type.as_deref() {
        Some(label) => ChallengeType::parse(label)
            .ok_or_else(|| PlanError::UnknownChallenge(label.to_string()))?,
        None => ChallengeType::Http01,
    };

    if wildcard && challenge == ChallengeType::Http01 {
        return Err(PlanError::WildcardRequiresDns {
            domain: service.base_domain().to_string(),
        });
    }

    let dns = match challenge {
        ChallengeType::Dns01 => {
            let config = match &overrides.dns_config {
                Some(block) => Some(DnsConfig::parse(block)?),
                None => settings.default_dns()?,
            };
            Some(config.ok_or(PlanError::MissingDnsProvider)?)
        }
        ChallengeType::Http01 => None,
    };

    // The test flag forces the staging CA unconditionally
    let test = overrides.test.unwrap_or(false);
    let ca_uri = if test {
        settings.staging_ca_uri.clone()
    } else {
        overrides
            .ca_uri
            .clone()
            .unwrap_or_else(|| settings.ca_uri.clone())
    };
    let staging = test || settings.is_staging_uri(&ca_uri);

    let key_size = resolve_key_size(
        service,
        overrides.key_size.as_deref(),
        &settings.default_key_size,
    );

    let email = overrides
        .email
        .clone()
        .or_else(|| settings.default_email.clone());

    Ok(IssuancePlan {
        challenge,
        dns,
        key_size,
        ocsp_must_staple: overrides.ocsp_must_staple.unwrap_or(false),
        preferred_chain: overrides.preferred_chain.clone(),
        pre_hook: overrides
            .pre_hook
            .clone()
            .or_else(|| settings.default_pre_hook.clone()),
        post_hook: overrides
            .post_hook
            .clone()
            .or_else(|| settings.default_post_hook.clone()),
        ca_uri,
        staging,
        email,
        eab_kid: overrides.eab_kid.clone(),
        eab_hmac_key: overrides.eab_hmac_key.clone(),
        wildcard,
        restart_on_renew: overrides.restart_on_renew.unwrap_or(false),
        renew_days: settings.renew_days,
        reuse_key: settings.reuse_private_keys,
    })
}

/// Resolve the key size with fallback on invalid or empty input
///
/// Service override first, then the configured default; an unparseable
/// default falls back to `ec-256` so issuance never stalls on a typo.
fn resolve_key_size(service: &Service, requested: Option<&str>, default: &str) -> KeySize {
    if let Some(label) = requested.filter(|l| !l.is_empty()) {
        if let Some(size) = KeySize::parse(label) {
            return size;
        }
        warn!(
            service = %service.id,
            requested = label,
            "Invalid key size requested, falling back to default"
        );
    }

    KeySize::parse(default).unwrap_or_else(|| {
        warn!(default, "Invalid default key size, using ec-256");
        KeySize::Ec256
    })
}
