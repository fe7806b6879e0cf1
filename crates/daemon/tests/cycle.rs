//! End-to-end reconciliation cycle tests
//!
//! Drives full cycles against recording collaborator mocks: the ACME
//! client materializes bundles on disk the way the external binary
//! would, the proxy counts reloads, and the runtime serves a static
//! service feed.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use certkeeper_config::Settings;
use certkeeper_daemon::account::account_file_path;
use certkeeper_daemon::acme::{
    AcmeClient, AcmeError, IssueOutcome, IssueParams, RegisterParams, UpdateParams,
};
use certkeeper_daemon::proxy::{ProxyController, ProxyError};
use certkeeper_daemon::service::{RuntimeError, ServiceOverrides, ServiceRuntime};
use certkeeper_daemon::{
    AccountManager, AliasStore, Orchestrator, Reconciler, Scheduler, Service, ServiceId,
    ZeroSslClient,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcmeCall {
    Register { email: Option<String>, eab: bool },
    Update { email: String },
    Issue { domains: Vec<String>, force: bool },
}

/// Shared ordered log of observable collaborator events
type EventLog = Arc<Mutex<Vec<String>>>;

/// ACME client mock that records calls and writes bundle files the way
/// the external binary would
struct RecordingAcmeClient {
    calls: Mutex<Vec<AcmeCall>>,
    issue_outcome: Mutex<Result<IssueOutcome, ()>>,
    update_fails: AtomicBool,
    events: Option<EventLog>,
}

impl RecordingAcmeClient {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            issue_outcome: Mutex::new(Ok(IssueOutcome::Issued)),
            update_fails: AtomicBool::new(false),
            events: None,
        }
    }

    fn with_events(events: EventLog) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    fn set_issue_outcome(&self, outcome: Result<IssueOutcome, ()>) {
        *self.issue_outcome.lock().unwrap() = outcome;
    }

    fn fail_updates(&self) {
        self.update_fails.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<AcmeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, event: &str) {
        if let Some(events) = &self.events {
            events.lock().unwrap().push(event.to_string());
        }
    }
}

#[async_trait]
impl AcmeClient for RecordingAcmeClient {
    async fn register_account(&self, params: &RegisterParams) -> Result<(), AcmeError> {
        self.calls.lock().unwrap().push(AcmeCall::Register {
            email: params.email.clone(),
            eab: params.eab.is_some(),
        });

        // The external client persists the account object on success
        let account_file =
            account_file_path(&params.env.config_home, &params.env.server_uri).unwrap();
        fs::create_dir_all(account_file.parent().unwrap()).unwrap();
        let contact = match &params.email {
            Some(email) => format!(r#"{{"contact": ["mailto:{email}"]}}"#),
            None => "{}".to_string(),
        };
        fs::write(account_file, contact).unwrap();
        Ok(())
    }

    async fn update_account(&self, params: &UpdateParams) -> Result<(), AcmeError> {
        self.calls.lock().unwrap().push(AcmeCall::Update {
            email: params.email.clone(),
        });
        if self.update_fails.load(Ordering::SeqCst) {
            return Err(AcmeError::Exit {
                operation: "update-account",
                code: Some(1),
            });
        }
        Ok(())
    }

    async fn issue(&self, params: &IssueParams) -> Result<IssueOutcome, AcmeError> {
        self.log("issue");
        self.calls.lock().unwrap().push(AcmeCall::Issue {
            domains: params.domains.clone(),
            force: params.force,
        });

        let outcome = self
            .issue_outcome
            .lock()
            .unwrap()
            .clone()
            .map_err(|()| AcmeError::Exit {
                operation: "issue",
                code: Some(1),
            })?;

        if outcome == IssueOutcome::Issued {
            fs::create_dir_all(&params.output_dir).unwrap();
            for file in ["cert.pem", "key.pem", "chain.pem", "fullchain.pem"] {
                fs::write(params.output_dir.join(file), file).unwrap();
            }
        }
        Ok(outcome)
    }
}

/// Proxy mock counting reloads; challenge serving is native
struct MockProxy {
    running: AtomicBool,
    reloads: AtomicUsize,
}

impl MockProxy {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reloads: AtomicUsize::new(0),
        }
    }

    fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyController for MockProxy {
    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn reload(&self) -> Result<(), ProxyError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn install_challenge_location(&self, _domain: &str) -> Result<bool, ProxyError> {
        Ok(false)
    }

    async fn remove_challenge_location(&self, _domain: &str) -> Result<bool, ProxyError> {
        Ok(false)
    }
}

/// Proxy mock that manages challenge locations like a snippet directory
/// would, logging every observable action in order
struct SnippetProxy {
    events: EventLog,
    installed: Mutex<BTreeSet<String>>,
}

impl SnippetProxy {
    fn new(events: EventLog) -> Self {
        Self {
            events,
            installed: Mutex::new(BTreeSet::new()),
        }
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ProxyController for SnippetProxy {
    async fn is_running(&self) -> bool {
        true
    }

    async fn reload(&self) -> Result<(), ProxyError> {
        self.log("reload".to_string());
        Ok(())
    }

    async fn install_challenge_location(&self, domain: &str) -> Result<bool, ProxyError> {
        if self.installed.lock().unwrap().insert(domain.to_string()) {
            self.log(format!("install {domain}"));
            return Ok(true);
        }
        Ok(false)
    }

    async fn remove_challenge_location(&self, domain: &str) -> Result<bool, ProxyError> {
        if self.installed.lock().unwrap().remove(domain) {
            self.log(format!("remove {domain}"));
            return Ok(true);
        }
        Ok(false)
    }
}

/// Static service feed recording restart requests
struct StaticRuntime {
    services: Mutex<Vec<Service>>,
    restarts: Mutex<Vec<ServiceId>>,
}

impl StaticRuntime {
    fn new(services: Vec<Service>) -> Self {
        Self {
            services: Mutex::new(services),
            restarts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ServiceRuntime for StaticRuntime {
    async fn list_services(&self) -> Result<Vec<Service>, RuntimeError> {
        Ok(self.services.lock().unwrap().clone())
    }

    async fn restart_service(&self, id: &ServiceId) -> Result<(), RuntimeError> {
        self.restarts.lock().unwrap().push(id.clone());
        Ok(())
    }
}

struct Fixture {
    _cert_dir: TempDir,
    _acme_home: TempDir,
    settings: Settings,
    acme: Arc<RecordingAcmeClient>,
    proxy: Arc<MockProxy>,
    runtime: Arc<StaticRuntime>,
    reconciler: Reconciler,
}

fn service(id: &str, domains: &[&str], overrides: ServiceOverrides) -> Service {
    Service {
        id: ServiceId::from(id),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        standalone: false,
        overrides,
    }
}

fn fixture(services: Vec<Service>) -> Fixture {
    let cert_dir = TempDir::new().unwrap();
    let acme_home = TempDir::new().unwrap();

    let settings = Settings {
        cert_dir: cert_dir.path().to_path_buf(),
        acme_home: acme_home.path().to_path_buf(),
        ..Settings::default()
    };

    let store = AliasStore::new(&settings.cert_dir).unwrap();
    let acme = Arc::new(RecordingAcmeClient::new());
    let proxy = Arc::new(MockProxy::new());
    let runtime = Arc::new(StaticRuntime::new(services));

    let orchestrator = Orchestrator::new(
        settings.clone(),
        store,
        acme.clone(),
        proxy.clone(),
        runtime.clone(),
    );
    let accounts = AccountManager::new(settings.clone(), ZeroSslClient::default());
    let reconciler = Reconciler::new(orchestrator, accounts);

    Fixture {
        _cert_dir: cert_dir,
        _acme_home: acme_home,
        settings,
        acme,
        proxy,
        runtime,
        reconciler,
    }
}

fn alias_path(settings: &Settings, name: &str) -> PathBuf {
    settings.cert_dir.join(name)
}

#[tokio::test]
async fn first_issuance_registers_issues_and_reloads_once() {
    let fx = fixture(vec![service(
        "s1",
        &["a.example.com", "b.example.com"],
        ServiceOverrides {
            email: Some("ops@example.com".to_string()),
            ..Default::default()
        },
    )]);

    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.issued, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.reloaded);

    let calls = fx.acme.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        AcmeCall::Register {
            email: Some("ops@example.com".to_string()),
            eab: false,
        }
    );
    assert_eq!(
        calls[1],
        AcmeCall::Issue {
            domains: vec!["a.example.com".to_string(), "b.example.com".to_string()],
            force: false,
        }
    );

    // Two aliases, both into the base domain's bundle
    for domain in ["a.example.com", "b.example.com"] {
        let target = fs::read_link(alias_path(&fx.settings, &format!("{domain}.crt"))).unwrap();
        assert_eq!(target, PathBuf::from("./a.example.com/fullchain.pem"));
    }

    // Exactly one reload for the whole cycle
    assert_eq!(fx.proxy.reload_count(), 1);
}

#[tokio::test]
async fn wildcard_http01_fails_without_acme_calls_and_cycle_continues() {
    let fx = fixture(vec![
        service("s2", &["*.example.com"], ServiceOverrides::default()),
        service("s3", &["ok.example.com"], ServiceOverrides::default()),
    ]);

    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.issued, 1);

    // The wildcard service never reached the ACME client
    let calls = fx.acme.calls();
    assert!(calls
        .iter()
        .all(|c| !matches!(c, AcmeCall::Issue { domains, .. } if domains[0].starts_with("*."))));
    assert!(alias_path(&fx.settings, "ok.example.com.crt").exists());
}

#[tokio::test]
async fn removed_service_is_cleaned_up_but_unmanaged_certs_survive() {
    let fx = fixture(vec![service(
        "s1",
        &["gone.example.com"],
        ServiceOverrides::default(),
    )]);

    // First cycle issues and aliases the service
    fx.reconciler.run_cycle(false).await.unwrap();
    assert!(alias_path(&fx.settings, "gone.example.com.crt").exists());

    // A manually placed certificate: aliased bundle without a marker
    let manual = fx.settings.cert_dir.join("manual.example.com");
    fs::create_dir_all(&manual).unwrap();
    fs::write(manual.join("fullchain.pem"), "cert").unwrap();
    fs::write(manual.join("key.pem"), "key").unwrap();
    let store = AliasStore::new(&fx.settings.cert_dir).unwrap();
    store.ensure_alias("manual.example.com", "manual.example.com").unwrap();

    // Service disappears from the feed
    fx.runtime.services.lock().unwrap().clear();
    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.removed_aliases, 1);
    assert!(summary.reloaded);
    assert!(!alias_path(&fx.settings, "gone.example.com.crt").exists());
    assert!(!alias_path(&fx.settings, "gone.example.com.key").exists());
    // Unmanaged alias untouched
    assert!(alias_path(&fx.settings, "manual.example.com.crt").exists());
}

#[tokio::test]
async fn renewal_not_due_is_a_skip_not_an_error() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides::default(),
    )]);

    // Initial issuance
    fx.reconciler.run_cycle(false).await.unwrap();

    fx.acme.set_issue_outcome(Ok(IssueOutcome::RenewalNotDue));
    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    // Aliases still in place
    assert!(alias_path(&fx.settings, "example.com.crt").exists());
    // Nothing changed, so the second cycle reloads nothing
    assert_eq!(fx.proxy.reload_count(), 1);
}

#[tokio::test]
async fn failed_issue_keeps_existing_aliases() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides::default(),
    )]);

    fx.reconciler.run_cycle(false).await.unwrap();
    assert!(alias_path(&fx.settings, "example.com.crt").exists());

    fx.acme.set_issue_outcome(Err(()));
    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.failed, 1);
    // Stale-but-valid material keeps serving
    assert!(alias_path(&fx.settings, "example.com.crt").exists());
}

fn seed_account(settings: &Settings, slot: &str, contact: &str) {
    let account_file =
        account_file_path(&settings.acme_home.join(slot), &settings.ca_uri).unwrap();
    fs::create_dir_all(account_file.parent().unwrap()).unwrap();
    fs::write(account_file, contact).unwrap();
}

#[tokio::test]
async fn changed_contact_email_updates_account_without_reregistering() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        },
    )]);
    seed_account(
        &fx.settings,
        "new@example.com",
        r#"{"contact": ["mailto:old@example.com"]}"#,
    );

    let summary = fx.reconciler.run_cycle(false).await.unwrap();
    assert_eq!(summary.issued, 1);

    let calls = fx.acme.calls();
    assert_eq!(
        calls[0],
        AcmeCall::Update {
            email: "new@example.com".to_string(),
        }
    );
    assert!(matches!(calls[1], AcmeCall::Issue { .. }));
    assert!(!calls.iter().any(|c| matches!(c, AcmeCall::Register { .. })));
}

#[tokio::test]
async fn failed_contact_update_does_not_block_issuance() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        },
    )]);
    seed_account(
        &fx.settings,
        "new@example.com",
        r#"{"contact": ["mailto:old@example.com"]}"#,
    );
    fx.acme.fail_updates();

    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.issued, 1);
    assert_eq!(summary.failed, 0);
    let updates = fx
        .acme
        .calls()
        .into_iter()
        .filter(|c| matches!(c, AcmeCall::Update { .. }))
        .count();
    assert_eq!(updates, 1);
    assert!(alias_path(&fx.settings, "example.com.crt").exists());
}

#[tokio::test]
async fn account_registered_once_across_cycles() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides::default(),
    )]);

    fx.reconciler.run_cycle(false).await.unwrap();
    fx.reconciler.run_cycle(false).await.unwrap();

    let registrations = fx
        .acme
        .calls()
        .into_iter()
        .filter(|c| matches!(c, AcmeCall::Register { .. }))
        .count();
    assert_eq!(registrations, 1);
}

#[tokio::test]
async fn force_renew_is_passed_through() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides::default(),
    )]);

    fx.reconciler.run_cycle(true).await.unwrap();

    assert!(fx
        .acme
        .calls()
        .iter()
        .any(|c| matches!(c, AcmeCall::Issue { force: true, .. })));
}

#[tokio::test]
async fn staging_service_gets_test_bundle_and_staging_slot() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides {
            test: Some(true),
            email: Some("ops@example.com".to_string()),
            ..Default::default()
        },
    )]);

    fx.reconciler.run_cycle(false).await.unwrap();

    // Staging bundles live in their own namespace
    assert!(fx.settings.cert_dir.join("_test_example.com").is_dir());
    let target = fs::read_link(alias_path(&fx.settings, "example.com.crt")).unwrap();
    assert_eq!(target, PathBuf::from("./_test_example.com/fullchain.pem"));

    // The staging identity never carries the configured email
    assert_eq!(
        fx.acme.calls()[0],
        AcmeCall::Register {
            email: None,
            eab: false,
        }
    );
    assert!(fx.settings.acme_home.join("staging").is_dir());
}

#[tokio::test]
async fn restart_on_renew_signals_the_runtime() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides {
            restart_on_renew: Some(true),
            ..Default::default()
        },
    )]);

    fx.reconciler.run_cycle(false).await.unwrap();

    let restarts = fx.runtime.restarts.lock().unwrap();
    assert_eq!(restarts.as_slice(), &[ServiceId::from("s1")]);
}

#[tokio::test]
async fn down_proxy_skips_the_cycle_silently() {
    let fx = fixture(vec![service(
        "s1",
        &["example.com"],
        ServiceOverrides::default(),
    )]);

    fx.proxy.running.store(false, Ordering::SeqCst);
    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert!(summary.proxy_down);
    assert_eq!(summary.processed, 0);
    assert!(fx.acme.calls().is_empty());
}

#[tokio::test]
async fn declared_domains_survive_reconcile_across_services() {
    let fx = fixture(vec![
        service("s1", &["a.example.com"], ServiceOverrides::default()),
        service("s2", &["b.example.com"], ServiceOverrides::default()),
    ]);

    fx.reconciler.run_cycle(false).await.unwrap();

    // Drop only the second service
    fx.runtime.services.lock().unwrap().truncate(1);
    let summary = fx.reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.removed_aliases, 1);
    assert!(alias_path(&fx.settings, "a.example.com.crt").exists());
    assert!(!alias_path(&fx.settings, "b.example.com.crt").exists());
}

#[tokio::test]
async fn scheduler_clamps_interval() {
    let fx = fixture(Vec::new());
    let scheduler = Scheduler::new(fx.reconciler).with_interval(Duration::from_secs(5));
    assert_eq!(scheduler.cycle_interval(), Duration::from_secs(60));
}

#[tokio::test]
async fn declared_wildcard_protects_stripped_alias() {
    let fx = fixture(vec![service(
        "s1",
        &["*.example.com"],
        ServiceOverrides {
            challenge_type: Some("dns-01".to_string()),
            dns_config: Some("DNS_API=dns_cf\nCF_Token=tok".to_string()),
            ..Default::default()
        },
    )]);

    fx.reconciler.run_cycle(false).await.unwrap();

    // Wildcard bundle in its own namespace, alias under the stripped name
    let target = fs::read_link(alias_path(&fx.settings, "example.com.crt")).unwrap();
    assert_eq!(target, PathBuf::from("./_wildcard.example.com/fullchain.pem"));

    // Still declared: reconcile must not remove it
    let summary = fx.reconciler.run_cycle(false).await.unwrap();
    assert_eq!(summary.removed_aliases, 0);
}

fn snippet_fixture(
    settings: Settings,
    services: Vec<Service>,
) -> (EventLog, Arc<RecordingAcmeClient>, Reconciler) {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let acme = Arc::new(RecordingAcmeClient::with_events(events.clone()));
    let proxy = Arc::new(SnippetProxy::new(events.clone()));
    let runtime = Arc::new(StaticRuntime::new(services));

    let store = AliasStore::new(&settings.cert_dir).unwrap();
    let orchestrator =
        Orchestrator::new(settings.clone(), store, acme.clone(), proxy, runtime);
    let accounts = AccountManager::new(settings, ZeroSslClient::default());
    (events, acme, Reconciler::new(orchestrator, accounts))
}

#[tokio::test]
async fn challenge_location_reloads_before_issue_and_is_removed_after() {
    let cert_dir = TempDir::new().unwrap();
    let acme_home = TempDir::new().unwrap();
    let settings = Settings {
        cert_dir: cert_dir.path().to_path_buf(),
        acme_home: acme_home.path().to_path_buf(),
        ..Settings::default()
    };
    let (events, _acme, reconciler) = snippet_fixture(
        settings,
        vec![service("s1", &["example.com"], ServiceOverrides::default())],
    );

    let summary = reconciler.run_cycle(false).await.unwrap();
    assert_eq!(summary.issued, 1);
    assert!(summary.reloaded);

    let events = events.lock().unwrap().clone();
    let issue_at = events.iter().position(|e| e == "issue").unwrap();
    let remove_at = events.iter().position(|e| e == "remove example.com").unwrap();

    // The fresh location must be reachable before validation starts
    assert!(events[..issue_at].contains(&"install example.com".to_string()));
    let reloads_before = events[..issue_at].iter().filter(|e| *e == "reload").count();
    assert_eq!(reloads_before, 1);

    // Cleanup happens after issuance, then one cycle-end reload
    assert!(remove_at > issue_at);
    assert_eq!(events.last().map(String::as_str), Some("reload"));
    assert_eq!(events.iter().filter(|e| *e == "reload").count(), 2);
}

#[tokio::test]
async fn standalone_preprovisioning_reloads_once_before_issuance() {
    let cert_dir = TempDir::new().unwrap();
    let acme_home = TempDir::new().unwrap();
    let settings = Settings {
        cert_dir: cert_dir.path().to_path_buf(),
        acme_home: acme_home.path().to_path_buf(),
        standalone_services: Some(
            r#"[{"id": "vpn", "domains": ["vpn.example.com"]}]"#.to_string(),
        ),
        ..Settings::default()
    };
    let (events, _acme, reconciler) = snippet_fixture(settings, Vec::new());

    let summary = reconciler.run_cycle(false).await.unwrap();
    assert_eq!(summary.issued, 1);

    // Pre-provisioning installs the location and reloads once up front;
    // issuance finds it already in place and adds no extra reload.
    let events = events.lock().unwrap().clone();
    assert_eq!(
        &events[..2],
        &["install vpn.example.com".to_string(), "reload".to_string()]
    );
    let issue_at = events.iter().position(|e| e == "issue").unwrap();
    let reloads_before = events[..issue_at].iter().filter(|e| *e == "reload").count();
    assert_eq!(reloads_before, 1);
    assert!(events.iter().any(|e| e == "remove vpn.example.com"));
}

#[tokio::test]
async fn standalone_services_from_config_are_processed() {
    let mut fx_services = Vec::new();
    fx_services.push(service("web", &["web.example.com"], ServiceOverrides::default()));

    let cert_dir = TempDir::new().unwrap();
    let acme_home = TempDir::new().unwrap();
    let settings = Settings {
        cert_dir: cert_dir.path().to_path_buf(),
        acme_home: acme_home.path().to_path_buf(),
        standalone_services: Some(
            r#"[{"id": "vpn", "domains": ["vpn.example.com"]}]"#.to_string(),
        ),
        ..Settings::default()
    };

    let store = AliasStore::new(&settings.cert_dir).unwrap();
    let acme = Arc::new(RecordingAcmeClient::new());
    let proxy = Arc::new(MockProxy::new());
    let runtime = Arc::new(StaticRuntime::new(fx_services));
    let orchestrator =
        Orchestrator::new(settings.clone(), store, acme.clone(), proxy, runtime);
    let accounts = AccountManager::new(settings.clone(), ZeroSslClient::default());
    let reconciler = Reconciler::new(orchestrator, accounts);

    let summary = reconciler.run_cycle(false).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.issued, 2);
    assert!(settings.cert_dir.join("vpn.example.com.crt").exists());
    assert!(settings.cert_dir.join("web.example.com.crt").exists());
}
