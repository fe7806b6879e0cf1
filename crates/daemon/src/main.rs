//! Certkeeper - Main entry point
//!
//! Certificate-lifecycle orchestrator for multi-tenant reverse-proxy hosts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use certkeeper_config::Settings;
use certkeeper_daemon::{
    AccountManager, AliasStore, CommandProxyController, FileServiceFeed, Orchestrator,
    Reconciler, Scheduler, ShellAcmeClient, ZeroSslClient,
};

/// Certkeeper - certificate-lifecycle orchestrator
#[derive(Parser, Debug)]
#[command(name = "certkeeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Force certificate reissue on the first reconciliation pass
    #[arg(long = "force-renew", env = "CERTKEEPER_FORCE_RENEW")]
    force_renew: bool,

    /// Run a single reconciliation cycle and exit
    #[arg(long = "once")]
    once: bool,

    /// Load and validate configuration, then exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let settings = Settings::from_env().context("Failed to load configuration")?;
    settings.validate().context("Configuration validation failed")?;

    if cli.test {
        println!("certkeeper: configuration test is successful");
        return Ok(());
    }

    info!(
        cert_dir = %settings.cert_dir.display(),
        acme_home = %settings.acme_home.display(),
        interval_secs = settings.update_interval_secs,
        "Starting certkeeper"
    );

    let store = AliasStore::new(&settings.cert_dir)
        .context("Failed to open certificate directory")?;

    let acme = Arc::new(ShellAcmeClient::new(settings.acme_bin.clone()));
    let proxy = Arc::new(CommandProxyController::new(
        settings.proxy_check_cmd.clone(),
        settings.proxy_reload_cmd.clone(),
        settings.challenge_location_dir.clone(),
        settings.webroot.clone(),
    ));
    let runtime = Arc::new(FileServiceFeed::new(
        settings
            .services_file
            .clone()
            .unwrap_or_else(|| "/run/certkeeper/services.json".into()),
        settings.restart_cmd.clone(),
    ));

    let zerossl = ZeroSslClient::default();
    let accounts = AccountManager::new(settings.clone(), zerossl);
    let orchestrator = Orchestrator::new(settings.clone(), store, acme, proxy, runtime);
    let reconciler = Reconciler::new(orchestrator, accounts);

    let scheduler = Scheduler::new(reconciler)
        .with_interval(Duration::from_secs(settings.update_interval_secs));

    if cli.once {
        let summary = scheduler
            .run_once(cli.force_renew)
            .await
            .context("Reconciliation cycle failed")?;
        info!(?summary, "Single cycle complete");
        return Ok(());
    }

    scheduler.run(cli.force_renew).await;
    Ok(())
}
