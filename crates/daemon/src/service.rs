//! Service model and the service-metadata collaborator
//!
//! A service is an opaque identifier plus an ordered, non-empty list of
//! domain names supplied each cycle by the external service runtime. The
//! first domain is the base domain and names the certificate bundle
//! directory. Services are never persisted here; all durable state lives
//! in the certificate tree.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

/// Wildcard domain prefix
pub const WILDCARD_PREFIX: &str = "*.";

/// Opaque service identifier assigned by the service runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create from an existing string
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-service overrides for the issuance plan
///
/// Every field is optional; unset fields fall back to the global
/// defaults in `Settings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceOverrides {
    /// Challenge type label (`http-01` or `dns-01`)
    #[serde(default)]
    pub challenge_type: Option<String>,
    /// Key size label
    #[serde(default)]
    pub key_size: Option<String>,
    /// Account email
    #[serde(default)]
    pub email: Option<String>,
    /// ACME directory URL
    #[serde(default)]
    pub ca_uri: Option<String>,
    /// Force the staging CA regardless of `ca_uri`
    #[serde(default)]
    pub test: Option<bool>,
    /// External-account-binding key id
    #[serde(default)]
    pub eab_kid: Option<String>,
    /// External-account-binding HMAC key
    #[serde(default)]
    pub eab_hmac_key: Option<String>,
    /// Pre-issuance hook command
    #[serde(default)]
    pub pre_hook: Option<String>,
    /// Post-issuance hook command
    #[serde(default)]
    pub post_hook: Option<String>,
    /// Preferred issuer chain selector
    #[serde(default)]
    pub preferred_chain: Option<String>,
    /// Request an OCSP-must-staple certificate
    #[serde(default)]
    pub ocsp_must_staple: Option<bool>,
    /// Restart the owning service after a renewal
    #[serde(default)]
    pub restart_on_renew: Option<bool>,
    /// DNS provider block (`KEY=VALUE` lines with `DNS_API`)
    #[serde(default)]
    pub dns_config: Option<String>,
}

/// A logical service declaring one or more domain names
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    /// Identifier from the service runtime
    pub id: ServiceId,
    /// Ordered domain list; the first entry is the base domain
    pub domains: Vec<String>,
    /// Declared in configuration rather than owned by a container
    #[serde(default)]
    pub standalone: bool,
    /// Per-service plan overrides
    #[serde(flatten)]
    pub overrides: ServiceOverrides,
}

impl Service {
    /// The canonical domain naming this service's certificate bundle
    ///
    /// Always the first declared domain.
    pub fn base_domain(&self) -> &str {
        &self.domains[0]
    }

    /// Whether this service requests a wildcard certificate
    ///
    /// True iff the base domain carries the `*.` prefix, and nothing else.
    pub fn is_wildcard(&self) -> bool {
        self.base_domain().starts_with(WILDCARD_PREFIX)
    }
}

/// Strip the wildcard marker from a domain, if present
pub fn strip_wildcard(domain: &str) -> &str {
    domain.strip_prefix(WILDCARD_PREFIX).unwrap_or(domain)
}

/// Errors from the service runtime collaborator
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The service metadata feed could not be read
    #[error("failed to read service feed: {0}")]
    Feed(String),

    /// The feed contents could not be parsed
    #[error("invalid service declarations: {0}")]
    Parse(#[from] serde_json::Error),

    /// A restart request failed
    #[error("failed to restart service '{id}': {message}")]
    Restart { id: ServiceId, message: String },
}

/// External service runtime collaborator
///
/// Supplies the declared service-to-domain mappings each cycle and
/// carries restart requests back to the runtime.
#[async_trait]
pub trait ServiceRuntime: Send + Sync {
    /// List all currently declared services, in declaration order
    async fn list_services(&self) -> Result<Vec<Service>, RuntimeError>;

    /// Restart a service after its certificate was renewed
    async fn restart_service(&self, id: &ServiceId) -> Result<(), RuntimeError>;
}

/// File-backed service feed
///
/// Reads a JSON array of service declarations maintained by the external
/// runtime integration (for example a container-event listener writing
/// the file). A missing file is an empty feed, not an error, so the
/// daemon tolerates startup ordering. Restarts are delegated to a
/// configured command with `{id}` substituted.
pub struct FileServiceFeed {
    path: PathBuf,
    restart_cmd: Option<String>,
}

impl FileServiceFeed {
    /// Create a feed reading from `path`
    pub fn new(path: PathBuf, restart_cmd: Option<String>) -> Self {
        Self { path, restart_cmd }
    }
}

#[async_trait]
impl ServiceRuntime for FileServiceFeed {
    async fn list_services(&self) -> Result<Vec<Service>, RuntimeError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "Service feed not present yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(RuntimeError::Feed(e.to_string())),
        };

        let services = parse_services(&raw)?;
        debug!(count = services.len(), "Loaded service declarations");
        Ok(services)
    }

    async fn restart_service(&self, id: &ServiceId) -> Result<(), RuntimeError> {
        let Some(template) = &self.restart_cmd else {
            debug!(service = %id, "No restart command configured, skipping restart");
            return Ok(());
        };

        let cmd = template.replace("{id}", id.as_str());
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| RuntimeError::Restart {
                id: id.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(RuntimeError::Restart {
                id: id.clone(),
                message: format!("restart command exited with {status}"),
            });
        }

        Ok(())
    }
}

/// Parse a JSON array of service declarations
///
/// Declarations without domains are dropped with a log line rather than
/// failing the whole feed.
pub fn parse_services(raw: &str) -> Result<Vec<Service>, RuntimeError> {
    let services: Vec<Service> = serde_json::from_str(raw)?;

    let (kept, dropped): (Vec<_>, Vec<_>) =
        services.into_iter().partition(|s| !s.domains.is_empty());

    for service in &dropped {
        tracing::warn!(service = %service.id, "Dropping service with empty domain list");
    }

    Ok(kept)
}

/// Parse standalone service declarations from configuration
///
/// Same JSON grammar as the runtime feed; every parsed service is
/// marked standalone.
pub fn parse_standalone_services(raw: &str) -> Result<Vec<Service>, RuntimeError> {
    let mut services = parse_services(raw)?;
    for service in &mut services {
        service.standalone = true;
    }
    Ok(services)
}
