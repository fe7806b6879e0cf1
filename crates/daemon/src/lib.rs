//! Certkeeper Daemon Library
//!
//! Certificate-lifecycle orchestration for a multi-tenant reverse-proxy
//! host: given the set of declared services and their domain names, it
//! obtains and continuously renews public TLS certificates and keeps
//! the certificate directory's alias graph consistent, reloading the
//! proxy only when something actually changed.
//!
//! The ACME wire protocol, the proxy process, and the service runtime
//! are external collaborators behind the [`AcmeClient`],
//! [`ProxyController`], and [`ServiceRuntime`] traits.
//!
//! # Architecture
//!
//! - [`resolve_plan`] - per-service issuance plan resolution
//! - [`AccountManager`] - account identity, registration and EAB decisions
//! - [`Orchestrator`] - end-to-end issuance for one service
//! - [`AliasStore`] - bundle directories, symlink aliases, orphan cleanup
//! - [`Reconciler`] - one full pass over all declared services
//! - [`Scheduler`] - fixed-interval daemon loop

// ============================================================================
// Module Declarations
// ============================================================================

pub mod account;
pub mod acme;
pub mod daemon;
pub mod error;
pub mod issue;
pub mod plan;
pub mod proxy;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod zerossl;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Plan resolution
pub use plan::{resolve_plan, ChallengeType, IssuancePlan, KeySize, PlanError};

// Account management
pub use account::{AccountManager, AccountResolution};

// ACME client capability
pub use acme::{AcmeClient, IssueOutcome, ShellAcmeClient};

// Alias store
pub use store::{AliasOutcome, AliasStore};

// Issuance orchestration
pub use issue::{CycleEffects, Orchestrator, Outcome};

// Reconciliation loop and scheduler
pub use daemon::Scheduler;
pub use reconcile::{CycleSummary, Reconciler};

// Collaborator traits
pub use proxy::{CommandProxyController, ProxyController};
pub use service::{FileServiceFeed, Service, ServiceId, ServiceRuntime};

// Error taxonomy
pub use error::{CycleError, ServiceError};

// ZeroSSL EAB support
pub use zerossl::{EabCredential, ZeroSslClient};
