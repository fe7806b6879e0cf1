//! Reverse-proxy collaborator
//!
//! The proxy process itself is external; this module only signals it.
//! The daemon needs three things from the proxy: a liveness check before
//! a cycle starts, a configuration reload after certificate changes, and
//! transient HTTP-01 challenge-serving locations per domain.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from proxy signalling
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A signalling command could not be run
    #[error("proxy command failed to start: {0}")]
    Spawn(#[from] std::io::Error),

    /// A signalling command exited non-zero
    #[error("proxy command '{command}' exited with {code:?}")]
    CommandFailed { command: String, code: Option<i32> },
}

/// External reverse-proxy collaborator
#[async_trait]
pub trait ProxyController: Send + Sync {
    /// Whether the proxy is up; a down proxy skips the whole cycle
    async fn is_running(&self) -> bool;

    /// Reload the proxy configuration
    async fn reload(&self) -> Result<(), ProxyError>;

    /// Install a challenge-serving location for a domain
    ///
    /// Returns `true` if a location was newly installed (requiring a
    /// reload before it becomes reachable); `false` if it already
    /// existed or the proxy serves challenges natively.
    async fn install_challenge_location(&self, domain: &str) -> Result<bool, ProxyError>;

    /// Remove a previously installed challenge-serving location
    ///
    /// Returns `true` if anything was removed.
    async fn remove_challenge_location(&self, domain: &str) -> Result<bool, ProxyError>;
}

/// Command-driven proxy controller
///
/// Runs configured shell commands for the liveness check and reload, and
/// manages per-domain challenge-location snippets in a drop-in directory
/// the proxy includes. With no snippet directory configured the proxy is
/// assumed to serve `/.well-known/acme-challenge/` natively.
pub struct CommandProxyController {
    check_cmd: Option<String>,
    reload_cmd: Option<String>,
    location_dir: Option<PathBuf>,
    webroot: PathBuf,
}

impl CommandProxyController {
    pub fn new(
        check_cmd: Option<String>,
        reload_cmd: Option<String>,
        location_dir: Option<PathBuf>,
        webroot: PathBuf,
    ) -> Self {
        Self {
            check_cmd,
            reload_cmd,
            location_dir,
            webroot,
        }
    }

    async fn run(&self, command: &str) -> Result<(), ProxyError> {
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(ProxyError::CommandFailed {
                command: command.to_string(),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn snippet_path(&self, dir: &std::path::Path, domain: &str) -> PathBuf {
        dir.join(format!("acme_challenge_{domain}.conf"))
    }
}

#[async_trait]
impl ProxyController for CommandProxyController {
    async fn is_running(&self) -> bool {
        let Some(cmd) = &self.check_cmd else {
            // No check configured: assume the proxy is already up
            return true;
        };

        match self.run(cmd).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Proxy liveness check failed");
                false
            }
        }
    }

    async fn reload(&self) -> Result<(), ProxyError> {
        let Some(cmd) = &self.reload_cmd else {
            warn!("No reload command configured, skipping proxy reload");
            return Ok(());
        };

        self.run(cmd).await?;
        info!("Proxy configuration reloaded");
        Ok(())
    }

    async fn install_challenge_location(&self, domain: &str) -> Result<bool, ProxyError> {
        let Some(dir) = &self.location_dir else {
            return Ok(false);
        };

        let path = self.snippet_path(dir, domain);
        if path.exists() {
            return Ok(false);
        }

        tokio::fs::create_dir_all(dir).await?;
        let snippet = format!(
            "location /.well-known/acme-challenge/ {{\n    root {};\n}}\n",
            self.webroot.display()
        );
        tokio::fs::write(&path, snippet).await?;
        debug!(domain, path = %path.display(), "Installed challenge location");
        Ok(true)
    }

    async fn remove_challenge_location(&self, domain: &str) -> Result<bool, ProxyError> {
        let Some(dir) = &self.location_dir else {
            return Ok(false);
        };

        let path = self.snippet_path(dir, domain);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(domain, "Removed challenge location");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
