//! Shell-backed ACME client
//!
//! Drives an external `acme.sh`-compatible binary through
//! `tokio::process`. Flag rendering is kept in pure functions so the
//! exact command lines are testable without spawning anything.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AcmeClient, AcmeError, ClientEnv, IssueOutcome, IssueParams, RegisterParams, UpdateParams};
use crate::plan::ChallengeType;

/// Exit code acme.sh uses for "renewal skipped, not yet due"
const EXIT_RENEW_SKIP: i32 = 2;

/// ACME client invoking an external binary
#[derive(Debug, Clone)]
pub struct ShellAcmeClient {
    bin: PathBuf,
}

impl ShellAcmeClient {
    /// Create a client around the given binary
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    async fn run(
        &self,
        operation: &'static str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Option<i32>, AcmeError> {
        debug!(operation, args = ?args, "Invoking ACME client");

        let mut command = tokio::process::Command::new(&self.bin);
        command.args(args).stdin(Stdio::null());
        for (key, value) in env {
            command.env(key, value);
        }

        let status = command.status().await.map_err(|source| AcmeError::Spawn {
            program: self.bin.display().to_string(),
            source,
        })?;

        Ok(status.code())
    }
}

#[async_trait]
impl AcmeClient for ShellAcmeClient {
    async fn register_account(&self, params: &RegisterParams) -> Result<(), AcmeError> {
        let args = register_args(params);
        match self.run("register-account", &args, &[]).await? {
            Some(0) => {
                info!(email = ?params.email, "ACME account registered");
                Ok(())
            }
            code => Err(AcmeError::Exit {
                operation: "register-account",
                code,
            }),
        }
    }

    async fn update_account(&self, params: &UpdateParams) -> Result<(), AcmeError> {
        let args = update_args(params);
        match self.run("update-account", &args, &[]).await? {
            Some(0) => {
                info!(email = %params.email, "ACME account contact updated");
                Ok(())
            }
            code => Err(AcmeError::Exit {
                operation: "update-account",
                code,
            }),
        }
    }

    async fn issue(&self, params: &IssueParams) -> Result<IssueOutcome, AcmeError> {
        let args = issue_args(params);
        let env: Vec<(String, String)> = params
            .dns
            .as_ref()
            .map(|dns| {
                dns.env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        match self.run("issue", &args, &env).await? {
            Some(0) => {
                info!(domains = ?params.domains, "Certificate issued");
                Ok(IssueOutcome::Issued)
            }
            Some(EXIT_RENEW_SKIP) => {
                debug!(domains = ?params.domains, "Renewal not yet due, skipping");
                Ok(IssueOutcome::RenewalNotDue)
            }
            code => {
                warn!(domains = ?params.domains, exit = ?code, "Issue operation failed");
                Err(AcmeError::Exit {
                    operation: "issue",
                    code,
                })
            }
        }
    }
}

fn env_args(env: &ClientEnv) -> Vec<String> {
    let mut args = vec![
        "--server".to_string(),
        env.server_uri.clone(),
        "--config-home".to_string(),
        env.config_home.display().to_string(),
        "--useragent".to_string(),
        env.user_agent.clone(),
    ];
    if let Some(bundle) = &env.ca_bundle {
        args.push("--ca-bundle".to_string());
        args.push(bundle.display().to_string());
    }
    args
}

/// Render the register-account command line
pub fn register_args(params: &RegisterParams) -> Vec<String> {
    let mut args = vec!["--register-account".to_string()];

    if let Some(email) = &params.email {
        args.push("--accountemail".to_string());
        args.push(email.clone());
    }
    if let Some(eab) = &params.eab {
        args.push("--eab-kid".to_string());
        args.push(eab.kid.clone());
        args.push("--eab-hmac-key".to_string());
        args.push(eab.hmac_key.clone());
    }

    args.extend(env_args(&params.env));
    args
}

/// Render the update-account command line
pub fn update_args(params: &UpdateParams) -> Vec<String> {
    let mut args = vec![
        "--update-account".to_string(),
        "--accountemail".to_string(),
        params.email.clone(),
    ];
    args.extend(env_args(&params.env));
    args
}

/// Render the issue command line
pub fn issue_args(params: &IssueParams) -> Vec<String> {
    let mut args = vec!["--issue".to_string()];

    for domain in &params.domains {
        args.push("-d".to_string());
        args.push(domain.clone());
    }

    match params.challenge {
        ChallengeType::Http01 => {
            args.push("--webroot".to_string());
            let webroot = params
                .webroot
                .as_ref()
                .map(|w| w.display().to_string())
                .unwrap_or_default();
            args.push(webroot);
        }
        ChallengeType::Dns01 => {
            args.push("--dns".to_string());
            args.push(
                params
                    .dns
                    .as_ref()
                    .map(|d| d.provider.clone())
                    .unwrap_or_default(),
            );
        }
    }

    args.push("--keylength".to_string());
    args.push(params.key_size.as_keylength().to_string());

    if params.ocsp_must_staple {
        args.push("--ocsp-must-staple".to_string());
    }
    if let Some(chain) = &params.preferred_chain {
        args.push("--preferred-chain".to_string());
        args.push(chain.clone());
    }
    if let Some(hook) = &params.pre_hook {
        args.push("--pre-hook".to_string());
        args.push(hook.clone());
    }
    if let Some(hook) = &params.post_hook {
        args.push("--post-hook".to_string());
        args.push(hook.clone());
    }

    args.push("--days".to_string());
    args.push(params.renew_days.to_string());

    if params.force {
        args.push("--force".to_string());
    }
    if !params.reuse_key {
        args.push("--always-force-new-domain-key".to_string());
    }

    // Install the bundle files directly into the certificate directory
    let out = &params.output_dir;
    args.push("--cert-file".to_string());
    args.push(out.join("cert.pem").display().to_string());
    args.push("--key-file".to_string());
    args.push(out.join("key.pem").display().to_string());
    args.push("--ca-file".to_string());
    args.push(out.join("chain.pem").display().to_string());
    args.push("--fullchain-file".to_string());
    args.push(out.join("fullchain.pem").display().to_string());

    args.extend(env_args(&params.env));
    args
}
