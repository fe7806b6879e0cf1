//! Reconciliation loop
//!
//! One pass resolves every declared service in order, issues or renews
//! where due, then diffs the on-disk alias graph against the declared
//! domain set and removes orphans. Reload signalling is coalesced to at
//! most one reload per cycle (unless configured otherwise). A down proxy
//! skips the whole cycle without error, treating it as startup ordering.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::account::AccountManager;
use crate::error::{CycleError, ServiceError};
use crate::issue::{CycleEffects, Orchestrator, Outcome};
use crate::plan::resolve_plan;
use crate::service::{parse_standalone_services, strip_wildcard, Service};

/// Tally of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Services processed this cycle
    pub processed: usize,
    /// Certificates issued or renewed
    pub issued: usize,
    /// Services skipped because renewal was not due
    pub skipped: usize,
    /// Services that hit a terminal error
    pub failed: usize,
    /// Orphaned domains whose aliases were removed
    pub removed_aliases: usize,
    /// Whether the proxy was reloaded at the end of the cycle
    pub reloaded: bool,
    /// The cycle was skipped because the proxy is not up yet
    pub proxy_down: bool,
}

/// Runs one full reconciliation pass at a time
pub struct Reconciler {
    orchestrator: Orchestrator,
    accounts: AccountManager,
}

impl Reconciler {
    pub fn new(orchestrator: Orchestrator, accounts: AccountManager) -> Self {
        Self {
            orchestrator,
            accounts,
        }
    }

    /// Run one reconciliation cycle
    ///
    /// Per-service errors are contained and tallied; only a failure to
    /// read the service feed or scan the certificate directory aborts
    /// the cycle (to be retried at the next interval).
    pub async fn run_cycle(&self, force_renew: bool) -> Result<CycleSummary, CycleError> {
        let mut summary = CycleSummary::default();

        if !self.orchestrator.proxy().is_running().await {
            info!("Proxy is not running yet, skipping this cycle");
            summary.proxy_down = true;
            return Ok(summary);
        }

        let mut services = self.standalone_services()?;
        services.extend(self.orchestrator.runtime().list_services().await?);

        debug!(count = services.len(), force_renew, "Starting reconciliation cycle");

        self.preprovision_standalone(&services).await;

        // Domains any active service still declares, wildcard-stripped;
        // cleanup spares these.
        let declared: BTreeSet<String> = services
            .iter()
            .flat_map(|s| s.domains.iter())
            .map(|d| strip_wildcard(d).to_string())
            .collect();

        let mut effects = CycleEffects::default();

        for service in &services {
            summary.processed += 1;

            let plan = match resolve_plan(service, self.orchestrator.settings()) {
                Ok(plan) => plan,
                Err(e) => {
                    error!(
                        service = %service.id,
                        error = %ServiceError::Config(e),
                        "Skipping service this cycle"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            let account = match self.accounts.resolve(&plan).await {
                Ok(account) => account,
                Err(e) => {
                    error!(
                        service = %service.id,
                        error = %ServiceError::Identity(e),
                        "Skipping service this cycle"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            let (outcome, service_effects) = self
                .orchestrator
                .issue_or_renew(service, &plan, &account, force_renew)
                .await;
            effects.absorb(service_effects);

            match outcome {
                Outcome::Issued => summary.issued += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }

        summary.removed_aliases = self.orchestrator.store().reconcile(&declared)?;
        if summary.removed_aliases > 0 {
            effects.reload_pending = true;
        }

        if self.orchestrator.settings().coalesce_reloads && effects.reload_pending {
            match self.orchestrator.proxy().reload().await {
                Ok(()) => summary.reloaded = true,
                Err(e) => warn!(error = %e, "Cycle-end proxy reload failed"),
            }
        }

        info!(
            processed = summary.processed,
            issued = summary.issued,
            skipped = summary.skipped,
            failed = summary.failed,
            removed = summary.removed_aliases,
            reloaded = summary.reloaded,
            "Reconciliation cycle complete"
        );

        Ok(summary)
    }

    fn standalone_services(&self) -> Result<Vec<Service>, CycleError> {
        let Some(raw) = &self.orchestrator.settings().standalone_services else {
            return Ok(Vec::new());
        };
        Ok(parse_standalone_services(raw)?)
    }

    /// Pre-provision challenge locations for standalone services
    ///
    /// Standalone services have no owning container to route challenge
    /// traffic, so their locations are installed up front with a single
    /// reload before any issuance starts.
    async fn preprovision_standalone(&self, services: &[Service]) {
        let mut installed_any = false;

        for service in services.iter().filter(|s| s.standalone) {
            // DNS-01 services need no challenge locations
            if service
                .overrides
                .challenge_type
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case("dns-01"))
            {
                continue;
            }
            for domain in &service.domains {
                let domain = strip_wildcard(domain);
                match self
                    .orchestrator
                    .proxy()
                    .install_challenge_location(domain)
                    .await
                {
                    Ok(true) => installed_any = true,
                    Ok(false) => {}
                    Err(e) => warn!(
                        service = %service.id,
                        domain,
                        error = %e,
                        "Failed to pre-provision challenge location"
                    ),
                }
            }
        }

        if installed_any {
            if let Err(e) = self.orchestrator.proxy().reload().await {
                warn!(error = %e, "Reload after standalone pre-provisioning failed");
            }
        }
    }
}
