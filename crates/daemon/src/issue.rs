//! Issuance orchestration for one service
//!
//! Drives the ACME client capability end-to-end for a single service's
//! domain set: registration or contact update when needed, transient
//! HTTP-01 challenge wiring, the issue call itself, then alias creation,
//! marker refresh, and permission hardening. Every terminal error is
//! contained to the service; the caller moves on to the next one.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::account::AccountResolution;
use crate::acme::{AcmeClient, ClientEnv, IssueOutcome, IssueParams, RegisterParams, UpdateParams};
use crate::error::ServiceError;
use crate::plan::{ChallengeType, IssuancePlan};
use crate::proxy::ProxyController;
use crate::service::{strip_wildcard, Service, ServiceRuntime};
use crate::store::{normalize_key_material, AliasOutcome, AliasStore};
use certkeeper_config::Settings;

/// Classified result of one service's issuance pass
///
/// A skip (renewal not yet due) is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A certificate was issued or renewed
    Issued,
    /// Renewal was not due; existing material left in place
    Skipped,
    /// A terminal error occurred; the service is skipped this cycle
    Failed,
}

/// Side effects accumulated while processing services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleEffects {
    /// The proxy must be reloaded before the new state is served
    pub reload_pending: bool,
    /// The owning service should be restarted
    pub restart_pending: bool,
}

impl CycleEffects {
    /// Merge effects from another service's pass
    pub fn absorb(&mut self, other: CycleEffects) {
        self.reload_pending |= other.reload_pending;
        self.restart_pending |= other.restart_pending;
    }
}

/// Drives issuance for one service at a time
pub struct Orchestrator {
    settings: Settings,
    store: AliasStore,
    acme: Arc<dyn AcmeClient>,
    proxy: Arc<dyn ProxyController>,
    runtime: Arc<dyn ServiceRuntime>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        store: AliasStore,
        acme: Arc<dyn AcmeClient>,
        proxy: Arc<dyn ProxyController>,
        runtime: Arc<dyn ServiceRuntime>,
    ) -> Self {
        Self {
            settings,
            store,
            acme,
            proxy,
            runtime,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &AliasStore {
        &self.store
    }

    pub fn proxy(&self) -> &dyn ProxyController {
        self.proxy.as_ref()
    }

    pub fn runtime(&self) -> &dyn ServiceRuntime {
        self.runtime.as_ref()
    }

    /// Issue or renew the certificate for one service
    ///
    /// Never returns an error: terminal failures are logged and reported
    /// as [`Outcome::Failed`], and the post-steps (restart signalling,
    /// challenge-location cleanup, optional immediate reload) run
    /// regardless of how far issuance got.
    pub async fn issue_or_renew(
        &self,
        service: &Service,
        plan: &IssuancePlan,
        account: &AccountResolution,
        force: bool,
    ) -> (Outcome, CycleEffects) {
        let mut effects = CycleEffects::default();
        let mut challenge_domains: Vec<String> = Vec::new();

        let outcome = match self
            .run_issuance(service, plan, account, force, &mut effects, &mut challenge_domains)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    service = %service.id,
                    base_domain = service.base_domain(),
                    error = %e,
                    "Issuance failed, skipping service this cycle"
                );
                Outcome::Failed
            }
        };

        // Post-steps run regardless of outcome.
        if plan.restart_on_renew && effects.restart_pending && !service.standalone {
            match self.runtime.restart_service(&service.id).await {
                Ok(()) => info!(service = %service.id, "Service restarted after renewal"),
                Err(e) => warn!(service = %service.id, error = %e, "Service restart failed"),
            }
        }

        for domain in &challenge_domains {
            match self.proxy.remove_challenge_location(domain).await {
                Ok(true) => effects.reload_pending = true,
                Ok(false) => {}
                Err(e) => {
                    warn!(domain, error = %e, "Failed to remove challenge location");
                }
            }
        }

        // With coalescing disabled the reload happens right here instead
        // of once at the end of the cycle.
        if !self.settings.coalesce_reloads && effects.reload_pending {
            match self.proxy.reload().await {
                Ok(()) => effects.reload_pending = false,
                Err(e) => warn!(error = %e, "Per-service proxy reload failed"),
            }
        }

        (outcome, effects)
    }

    async fn run_issuance(
        &self,
        service: &Service,
        plan: &IssuancePlan,
        account: &AccountResolution,
        force: bool,
        effects: &mut CycleEffects,
        challenge_domains: &mut Vec<String>,
    ) -> Result<Outcome, ServiceError> {
        let bundle_name = AliasStore::bundle_dir_name(service.base_domain(), plan.staging);
        let bundle_dir = self.store.ensure_bundle_dir(&bundle_name)?;

        let env = self.client_env(plan, account);

        if account.registration_needed {
            self.acme
                .register_account(&RegisterParams {
                    env: env.clone(),
                    email: account.email.clone(),
                    eab: account.eab.clone(),
                })
                .await?;
        } else if account.email_update_needed {
            // A failed contact update is logged, not terminal
            if let Some(email) = &account.email {
                let update = UpdateParams {
                    env: env.clone(),
                    email: email.clone(),
                };
                if let Err(e) = self.acme.update_account(&update).await {
                    warn!(
                        service = %service.id,
                        error = %e,
                        "Account contact update failed, attempting issuance anyway"
                    );
                }
            }
        }

        if !account.account_file.exists() {
            return Err(ServiceError::MissingAccount {
                path: account.account_file.clone(),
            });
        }

        if plan.challenge == ChallengeType::Http01 {
            let mut installed_any = false;
            for domain in &service.domains {
                let domain = strip_wildcard(domain);
                if self.proxy.install_challenge_location(domain).await? {
                    installed_any = true;
                }
                challenge_domains.push(domain.to_string());
            }
            if installed_any {
                // The challenge path must be reachable before validation
                self.proxy.reload().await?;
            }
        }

        let issue_outcome = self
            .acme
            .issue(&IssueParams {
                env,
                domains: service.domains.clone(),
                challenge: plan.challenge,
                webroot: (plan.challenge == ChallengeType::Http01)
                    .then(|| self.settings.webroot.clone()),
                dns: plan.dns.clone(),
                key_size: plan.key_size,
                ocsp_must_staple: plan.ocsp_must_staple,
                preferred_chain: plan.preferred_chain.clone(),
                pre_hook: plan.pre_hook.clone(),
                post_hook: plan.post_hook.clone(),
                renew_days: plan.renew_days,
                force,
                reuse_key: plan.reuse_key,
                output_dir: bundle_dir,
            })
            .await?;

        for domain in &service.domains {
            match self.store.ensure_alias(&bundle_name, domain) {
                Ok(AliasOutcome::Created) => {
                    effects.reload_pending = true;
                    effects.restart_pending = true;
                }
                Ok(AliasOutcome::AlreadyCorrect) => {}
                Ok(AliasOutcome::Skipped) => {
                    error!(
                        service = %service.id,
                        domain,
                        "Bundle incomplete, alias skipped"
                    );
                }
                Err(e) => {
                    // One domain's alias failure must not abort the others
                    error!(service = %service.id, domain, error = %e, "Alias creation failed");
                }
            }
        }

        self.store.write_marker(&bundle_name)?;
        self.store.normalize_bundle_permissions(&bundle_name)?;
        normalize_key_material(&account.config_home, service.base_domain())?;

        match issue_outcome {
            IssueOutcome::Issued => {
                effects.reload_pending = true;
                effects.restart_pending = true;
                info!(
                    service = %service.id,
                    domains = ?service.domains,
                    "Certificate issued"
                );
                Ok(Outcome::Issued)
            }
            IssueOutcome::RenewalNotDue => {
                debug!(service = %service.id, "Renewal not due");
                Ok(Outcome::Skipped)
            }
        }
    }

    fn client_env(&self, plan: &IssuancePlan, account: &AccountResolution) -> ClientEnv {
        ClientEnv {
            server_uri: plan.ca_uri.clone(),
            config_home: account.config_home.clone(),
            user_agent: self.settings.user_agent.clone(),
            ca_bundle: self.settings.ca_bundle.clone(),
        }
    }
}
