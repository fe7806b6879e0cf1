//! ACME client capability
//!
//! The ACME wire protocol (account keys, JWS signing, challenge
//! validation, certificate download) lives behind the [`AcmeClient`]
//! trait. The orchestrator only sees three operations and their
//! classified exits; the default implementation in [`shell`] drives an
//! external `acme.sh`-compatible binary.

pub mod shell;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::{ChallengeType, KeySize};
use crate::zerossl::EabCredential;
use certkeeper_config::DnsConfig;

pub use shell::ShellAcmeClient;

/// Routing and identity parameters common to every client invocation
#[derive(Debug, Clone)]
pub struct ClientEnv {
    /// ACME directory URL
    pub server_uri: String,
    /// Client config home (account and key storage)
    pub config_home: PathBuf,
    /// User-agent string reported to the CA
    pub user_agent: String,
    /// Alternate trust-store bundle
    pub ca_bundle: Option<PathBuf>,
}

/// Parameters for account registration
#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub env: ClientEnv,
    /// Contact email, if any
    pub email: Option<String>,
    /// External-account-binding credential, if required by the CA
    pub eab: Option<EabCredential>,
}

/// Parameters for an account contact update
#[derive(Debug, Clone)]
pub struct UpdateParams {
    pub env: ClientEnv,
    /// New contact email
    pub email: String,
}

/// Parameters for certificate issuance or renewal
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub env: ClientEnv,
    /// All domains on the certificate, base domain first
    pub domains: Vec<String>,
    /// Selected challenge type
    pub challenge: ChallengeType,
    /// Webroot for HTTP-01 token serving
    pub webroot: Option<PathBuf>,
    /// DNS provider for DNS-01
    pub dns: Option<DnsConfig>,
    /// Key size
    pub key_size: KeySize,
    /// Request an OCSP-must-staple certificate
    pub ocsp_must_staple: bool,
    /// Preferred issuer chain selector
    pub preferred_chain: Option<String>,
    /// Pre-issuance hook command
    pub pre_hook: Option<String>,
    /// Post-issuance hook command
    pub post_hook: Option<String>,
    /// Renewal window in days
    pub renew_days: u32,
    /// Force reissue even when renewal is not due
    pub force: bool,
    /// Reuse the existing private key
    pub reuse_key: bool,
    /// Bundle directory receiving cert/key/chain/fullchain files
    pub output_dir: PathBuf,
}

/// Classified result of an issue operation
///
/// A renewal that is not yet due is an expected, successful exit;
/// only [`AcmeError`] values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A certificate was issued or renewed
    Issued,
    /// The existing certificate is still inside the renewal window
    RenewalNotDue,
}

/// Errors from the ACME client collaborator
#[derive(Debug, Error)]
pub enum AcmeError {
    /// The client process could not be started
    #[error("failed to spawn ACME client '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The client exited with a failure status
    #[error("ACME client {operation} failed with exit code {code:?}")]
    Exit {
        operation: &'static str,
        code: Option<i32>,
    },
}

/// Abstract ACME client collaborator
///
/// All three operations are blocking from the orchestrator's point of
/// view; issuance in particular may run for minutes while challenges
/// propagate and validate.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Register a new account with the CA
    async fn register_account(&self, params: &RegisterParams) -> Result<(), AcmeError>;

    /// Update the contact email on an existing account
    async fn update_account(&self, params: &UpdateParams) -> Result<(), AcmeError>;

    /// Issue or renew a certificate for a domain set
    async fn issue(&self, params: &IssueParams) -> Result<IssueOutcome, AcmeError>;
}
