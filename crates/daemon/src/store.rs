//! Certificate bundle and alias store
//!
//! Filesystem abstraction over the certificate directory. Each bundle
//! lives in a directory named for its base domain and holds the leaf
//! cert, key, chain, full chain, and a marker file recording which
//! orchestrator version produced it. Every declared domain gets symbolic
//! aliases (`<domain>.crt`, `.key`, optional `.chain.pem` and shared
//! `.dhparam.pem`) pointing into a bundle.
//!
//! # Directory Structure
//!
//! ```text
//! certs/
//! ├── example.com/
//! │   ├── cert.pem
//! │   ├── key.pem
//! │   ├── chain.pem
//! │   ├── fullchain.pem
//! │   └── .companion        # managed-bundle marker
//! ├── dhparam.pem           # shared, never removed by cleanup
//! ├── example.com.crt -> ./example.com/fullchain.pem
//! └── example.com.key -> ./example.com/key.pem
//! ```
//!
//! Cleanup only ever touches aliases whose bundle carries the marker
//! file; manually placed certificates are left alone.

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::service::{strip_wildcard, WILDCARD_PREFIX};

/// Managed-bundle marker file name
pub const MARKER_FILE: &str = ".companion";
/// Fallback alias excluded from cleanup scanning
pub const DEFAULT_ALIAS: &str = "default";
/// Prefix namespacing staging bundles away from production ones
pub const STAGING_PREFIX: &str = "_test_";
/// Prefix namespacing wildcard bundles away from same-named exact ones
pub const WILDCARD_NAMESPACE: &str = "_wildcard.";

/// Alias file extensions managed per domain
const ALIAS_EXTENSIONS: [&str; 4] = ["crt", "key", "chain.pem", "dhparam.pem"];

/// Storage errors degrade per domain and never abort a cycle
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Marker file serialization failed
    #[error("marker serialization error: {0}")]
    Marker(#[from] serde_json::Error),
}

/// Result of an alias ensure operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    /// An alias was created or re-pointed
    Created,
    /// The alias already resolved to the desired bundle
    AlreadyCorrect,
    /// The bundle is missing its core files; nothing was linked
    Skipped,
}

/// Marker recording which orchestrator produced a bundle
#[derive(Debug, Serialize, Deserialize)]
struct Marker {
    version: String,
    created: DateTime<Utc>,
}

/// Filesystem store for certificate bundles and their aliases
#[derive(Debug, Clone)]
pub struct AliasStore {
    cert_dir: PathBuf,
}

impl AliasStore {
    /// Open (and create if needed) the certificate directory
    pub fn new(cert_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(cert_dir)?;
        Ok(Self {
            cert_dir: cert_dir.to_path_buf(),
        })
    }

    /// The certificate directory root
    pub fn cert_dir(&self) -> &Path {
        &self.cert_dir
    }

    /// Relative bundle directory name for a base domain
    ///
    /// Wildcard certificates get their own namespace so they never
    /// collide with an exact certificate for the stripped name, and
    /// staging bundles are prefixed so they never collide with
    /// production bundles for the same domain.
    pub fn bundle_dir_name(base_domain: &str, staging: bool) -> String {
        let name = if base_domain.starts_with(WILDCARD_PREFIX) {
            format!("{WILDCARD_NAMESPACE}{}", strip_wildcard(base_domain))
        } else {
            base_domain.to_string()
        };

        if staging {
            format!("{STAGING_PREFIX}{name}")
        } else {
            name
        }
    }

    /// Absolute path of a bundle directory
    pub fn bundle_dir(&self, bundle_name: &str) -> PathBuf {
        self.cert_dir.join(bundle_name)
    }

    /// Create a bundle directory if it does not exist yet
    pub fn ensure_bundle_dir(&self, bundle_name: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bundle_dir(bundle_name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write or refresh the managed-bundle marker
    pub fn write_marker(&self, bundle_name: &str) -> Result<(), StoreError> {
        let marker = Marker {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: Utc::now(),
        };
        let path = self.bundle_dir(bundle_name).join(MARKER_FILE);
        fs::write(&path, serde_json::to_string_pretty(&marker)?)?;
        trace!(bundle = bundle_name, "Refreshed bundle marker");
        Ok(())
    }

    /// Whether a bundle carries the managed marker
    pub fn is_managed(&self, bundle_dir: &Path) -> bool {
        bundle_dir.join(MARKER_FILE).exists()
    }

    /// Ensure a domain's aliases point at a bundle
    ///
    /// The `.crt`/`.key` pair is required; `.chain.pem` and the shared
    /// `.dhparam.pem` are linked opportunistically when their targets
    /// exist. Idempotent: an alias already pointing at the right bundle
    /// reports [`AliasOutcome::AlreadyCorrect`] but still gets its
    /// bundle permissions re-normalized to cover drift.
    pub fn ensure_alias(&self, bundle_name: &str, domain: &str) -> Result<AliasOutcome, StoreError> {
        let bundle_dir = self.bundle_dir(bundle_name);

        // Both core files present is the sole precondition for aliasing
        if !bundle_dir.join("fullchain.pem").exists() || !bundle_dir.join("key.pem").exists() {
            warn!(
                bundle = bundle_name,
                domain, "Bundle incomplete, skipping alias creation"
            );
            return Ok(AliasOutcome::Skipped);
        }

        let alias = strip_wildcard(domain);
        let mut changed = false;

        changed |= self.link(
            &format!("{alias}.crt"),
            &format!("./{bundle_name}/fullchain.pem"),
        )?;
        changed |= self.link(&format!("{alias}.key"), &format!("./{bundle_name}/key.pem"))?;

        if bundle_dir.join("chain.pem").exists() {
            changed |= self.link(
                &format!("{alias}.chain.pem"),
                &format!("./{bundle_name}/chain.pem"),
            )?;
        }
        if self.cert_dir.join("dhparam.pem").exists() {
            changed |= self.link(&format!("{alias}.dhparam.pem"), "./dhparam.pem")?;
        }

        // Re-normalize even when nothing moved; covers permission drift
        // after host migrations.
        self.normalize_bundle_permissions(bundle_name)?;

        if changed {
            info!(domain, bundle = bundle_name, "Alias created");
            Ok(AliasOutcome::Created)
        } else {
            trace!(domain, bundle = bundle_name, "Alias already correct");
            Ok(AliasOutcome::AlreadyCorrect)
        }
    }

    /// Create or re-point one symlink; returns whether anything changed
    fn link(&self, link_name: &str, target: &str) -> Result<bool, StoreError> {
        let link_path = self.cert_dir.join(link_name);
        let desired = PathBuf::from(target);

        match fs::read_link(&link_path) {
            Ok(existing) if existing == desired => return Ok(false),
            Ok(_) => {
                debug!(link = link_name, target, "Re-pointing alias");
            }
            Err(_) => {}
        }

        // Atomic replace: link a temporary name, then rename over
        let tmp_path = self.cert_dir.join(format!("{link_name}.tmp"));
        let _ = fs::remove_file(&tmp_path);
        symlink(&desired, &tmp_path)?;
        fs::rename(&tmp_path, &link_path)?;
        Ok(true)
    }

    /// Normalize ownership-sensitive permissions on a bundle's files
    ///
    /// Private key most restrictive (0600), everything else 0644.
    pub fn normalize_bundle_permissions(&self, bundle_name: &str) -> Result<(), StoreError> {
        use std::os::unix::fs::PermissionsExt;

        let bundle_dir = self.bundle_dir(bundle_name);
        for entry in fs::read_dir(&bundle_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let mode = if entry.file_name() == "key.pem" { 0o600 } else { 0o644 };
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
        }
        Ok(())
    }

    /// Remove aliases for domains no longer declared by any service
    ///
    /// Scans existing `.crt` aliases (excluding the default alias),
    /// diffs against the declared set, and removes every alias extension
    /// of orphaned domains, but only when the target bundle carries the
    /// managed marker. Returns the number of domains cleaned up.
    pub fn reconcile(&self, declared: &BTreeSet<String>) -> Result<usize, StoreError> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.cert_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(domain) = name.strip_suffix(".crt") else {
                continue;
            };
            if domain == DEFAULT_ALIAS || declared.contains(domain) {
                continue;
            }
            if !entry.file_type()?.is_symlink() {
                // A plain file here was placed by hand; not ours to manage
                continue;
            }

            let target = fs::read_link(entry.path())?;
            let Some(bundle_dir) = self.cert_dir.join(&target).parent().map(Path::to_path_buf)
            else {
                continue;
            };

            if !self.is_managed(&bundle_dir) {
                debug!(domain, "Orphaned alias targets unmanaged bundle, leaving in place");
                continue;
            }

            for ext in ALIAS_EXTENSIONS {
                let path = self.cert_dir.join(format!("{domain}.{ext}"));
                match fs::remove_file(&path) {
                    Ok(()) => trace!(path = %path.display(), "Removed orphaned alias"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }

            info!(domain, "Removed aliases for undeclared domain");
            removed += 1;
        }

        Ok(removed)
    }
}

/// Tighten permissions on the ACME client's key material for a domain
///
/// The external client keeps per-domain directories under its config
/// home; every `.key` file inside directories belonging to the base
/// domain is clamped to 0600.
pub fn normalize_key_material(config_home: &Path, base_domain: &str) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let prefix = strip_wildcard(base_domain);
    let Ok(entries) = fs::read_dir(config_home) else {
        return Ok(());
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(prefix) || !entry.path().is_dir() {
            continue;
        }
        for file in fs::read_dir(entry.path())?.flatten() {
            let is_key = file
                .path()
                .extension()
                .is_some_and(|ext| ext == "key");
            if is_key && file.path().is_file() {
                fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))?;
            }
        }
    }

    Ok(())
}
