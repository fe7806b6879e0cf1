//! Error taxonomy for per-service failures
//!
//! Every variant is terminal for one service's cycle only; the
//! reconciliation loop logs it and continues with the next service.
//! Nothing here ever aborts the daemon.

use thiserror::Error;

use crate::account::AccountError;
use crate::acme::AcmeError;
use crate::plan::PlanError;
use crate::proxy::ProxyError;
use crate::service::RuntimeError;
use crate::store::StoreError;

/// A terminal per-service failure
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid or contradictory service configuration
    #[error("config error: {0}")]
    Config(#[from] PlanError),

    /// No usable account identity could be resolved
    #[error("identity error: {0}")]
    Identity(#[from] AccountError),

    /// The ACME client collaborator failed
    #[error("transport error: {0}")]
    Transport(#[from] AcmeError),

    /// Certificate directory state could not be updated
    #[error("filesystem error: {0}")]
    Filesystem(#[from] StoreError),

    /// Proxy signalling failed mid-issuance
    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// The account file is still missing after registration
    #[error("no account file present after registration at {path}")]
    MissingAccount { path: std::path::PathBuf },
}

/// A failure aborting one whole reconciliation cycle
///
/// Retried at the next interval; never escalated past the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The service metadata feed could not be read
    #[error("service feed error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The certificate directory could not be scanned
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
