//! ACME account resolution
//!
//! Decides whether an account must be registered or updated for a
//! service's resolved plan, and derives where the external ACME client
//! keeps that account on disk. The path mirrors the client's own
//! derivation (slot, then CA host and path segments) so both sides stay
//! in sync. An existing account file is authoritative proof of prior
//! registration; it is never re-registered, only updated when the
//! contact email changed.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::plan::IssuancePlan;
use crate::zerossl::{is_zerossl_ca, EabCredential, ZeroSslClient, ZeroSslError};
use certkeeper_config::Settings;

/// Account slot used for anonymous production accounts
pub const DEFAULT_SLOT: &str = "default";
/// Account slot used for all staging accounts
pub const STAGING_SLOT: &str = "staging";
/// Account file name inside the CA-derived directory
pub const ACCOUNT_FILE: &str = "account.json";

/// Identity resolution errors, terminal per service
#[derive(Debug, Error)]
pub enum AccountError {
    /// The resolved CA URI cannot be turned into a storage path
    #[error("cannot derive account path from CA URI '{0}'")]
    CaUri(String),

    /// The existing account file could not be inspected
    #[error("failed to read account file: {0}")]
    Io(#[from] std::io::Error),

    /// ZeroSSL requires EAB and the dynamic fetch failed
    #[error(transparent)]
    ZeroSsl(#[from] ZeroSslError),

    /// No registration strategy is available for this CA
    #[error("no email-bound account possible for '{ca_uri}'")]
    NoUsableIdentity { ca_uri: String },
}

/// Resolved account identity for one service's cycle
#[derive(Debug, Clone)]
pub struct AccountResolution {
    /// Client config home for this identity (`<acme_home>/<slot>`)
    pub config_home: PathBuf,
    /// Account file under the CA-derived path
    pub account_file: PathBuf,
    /// No account file exists; registration is required
    pub registration_needed: bool,
    /// The account exists but its recorded contact email differs
    pub email_update_needed: bool,
    /// Effective contact email (stripped for staging identities)
    pub email: Option<String>,
    /// EAB credential to register with, if any
    pub eab: Option<EabCredential>,
}

/// Resolves account identity and EAB credentials per plan
#[derive(Debug, Clone)]
pub struct AccountManager {
    settings: Settings,
    zerossl: ZeroSslClient,
}

impl AccountManager {
    pub fn new(settings: Settings, zerossl: ZeroSslClient) -> Self {
        Self { settings, zerossl }
    }

    /// Resolve the account identity for a plan
    ///
    /// May perform one ZeroSSL EAB credential fetch when registration is
    /// needed against the ZeroSSL CA and no static credential exists.
    pub async fn resolve(&self, plan: &IssuancePlan) -> Result<AccountResolution, AccountError> {
        // Staging identities never share a slot (or an email) with
        // production ones.
        let email = if plan.staging { None } else { plan.email.clone() };

        let slot = if plan.staging {
            STAGING_SLOT.to_string()
        } else {
            email.clone().unwrap_or_else(|| DEFAULT_SLOT.to_string())
        };

        let config_home = self.settings.acme_home.join(&slot);
        let account_file = account_file_path(&config_home, &plan.ca_uri)?;
        let registration_needed = !account_file.exists();

        let email_update_needed = if registration_needed {
            false
        } else {
            match (&email, recorded_contact(&account_file)?) {
                (Some(wanted), Some(recorded)) => wanted != &recorded,
                (Some(_), None) => true,
                (None, _) => false,
            }
        };

        let eab = if registration_needed {
            self.resolve_eab(plan, email.as_deref()).await?
        } else {
            None
        };

        debug!(
            slot = %slot,
            account_file = %account_file.display(),
            registration_needed,
            email_update_needed,
            "Resolved account identity"
        );

        Ok(AccountResolution {
            config_home,
            account_file,
            registration_needed,
            email_update_needed,
            email,
            eab,
        })
    }

    /// EAB resolution ladder for a fresh registration
    ///
    /// Service credential, then global default, then plain email
    /// registration. ZeroSSL always requires EAB: with neither static
    /// credential present, one pair is fetched dynamically, and a
    /// missing API key is a terminal identity error.
    async fn resolve_eab(
        &self,
        plan: &IssuancePlan,
        email: Option<&str>,
    ) -> Result<Option<EabCredential>, AccountError> {
        if let Some(eab) = static_eab(plan.eab_kid.as_deref(), plan.eab_hmac_key.as_deref()) {
            return Ok(Some(eab));
        }
        if let Some(eab) = static_eab(
            self.settings.default_eab_kid.as_deref(),
            self.settings.default_eab_hmac_key.as_deref(),
        ) {
            return Ok(Some(eab));
        }

        if is_zerossl_ca(&plan.ca_uri) {
            let Some(api_key) = &self.settings.zerossl_api_key else {
                return Err(AccountError::NoUsableIdentity {
                    ca_uri: plan.ca_uri.clone(),
                });
            };
            let eab = self.zerossl.fetch_eab_credentials(api_key).await?;
            return Ok(Some(eab));
        }

        if email.is_none() {
            debug!(ca = %plan.ca_uri, "Registering anonymous account without EAB");
        }
        Ok(None)
    }
}

fn static_eab(kid: Option<&str>, hmac_key: Option<&str>) -> Option<EabCredential> {
    match (kid, hmac_key) {
        (Some(kid), Some(hmac_key)) => Some(EabCredential {
            kid: kid.to_string(),
            hmac_key: hmac_key.to_string(),
        }),
        (Some(_), None) | (None, Some(_)) => {
            warn!("Ignoring half-configured EAB credential (need both kid and HMAC key)");
            None
        }
        (None, None) => None,
    }
}

/// Derive the account file path from the CA URI
///
/// `<config_home>/ca/<host>/<path segments>/account.json`, mirroring the
/// external client's storage layout.
pub fn account_file_path(config_home: &Path, ca_uri: &str) -> Result<PathBuf, AccountError> {
    let url = Url::parse(ca_uri).map_err(|_| AccountError::CaUri(ca_uri.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| AccountError::CaUri(ca_uri.to_string()))?;

    let mut path = config_home.join("ca").join(host);
    if let Some(segments) = url.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            path.push(segment);
        }
    }
    path.push(ACCOUNT_FILE);
    Ok(path)
}

/// Read the contact email recorded in an existing account file
///
/// The account file is the CA's account object as stored by the ACME
/// client; contacts appear as `mailto:` URIs.
fn recorded_contact(account_file: &Path) -> Result<Option<String>, AccountError> {
    let raw = fs::read_to_string(account_file)?;

    let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
        warn!(
            path = %account_file.display(),
            "Account file is not valid JSON, skipping contact comparison"
        );
        return Ok(None);
    };

    let contact = value
        .get("contact")
        .and_then(|c| c.as_array())
        .and_then(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_str())
                .find_map(|e| e.strip_prefix("mailto:"))
        })
        .map(|email| email.to_string());

    Ok(contact)
}
