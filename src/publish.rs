//! Publishing - hand a generated bundle to the platform's upload CLI
//!
//! The core only builds the request and derives the remote path. What the
//! CLI does with it is opaque: success and captured output lines come back
//! as a [`PublishOutcome`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

use crate::codegen::{is_contained_path, GeneratedFiles};
use crate::pipeline::ModuleBundle;

pub const DEFAULT_ACCOUNT: &str = "dev-edgardo";
pub const DEFAULT_REMOTE_BASE: &str = "hsmb";
pub const DEFAULT_CLI_BIN: &str = "hs";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish target is missing {0}")]
    MissingTarget(&'static str),

    #[error("Publish request is missing a slug")]
    MissingSlug,

    #[error("Refusing to stage file outside the bundle: {0}")]
    InvalidPath(String),

    #[error("Failed to stage files: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where a module is uploaded: account plus remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTarget {
    pub account: String,
    pub remote_base: String,
}

impl Default for PublishTarget {
    fn default() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            remote_base: DEFAULT_REMOTE_BASE.to_string(),
        }
    }
}

impl PublishTarget {
    /// Create from user input with validation
    pub fn new(account: &str, remote_base: &str) -> Result<Self, PublishError> {
        if account.trim().is_empty() {
            return Err(PublishError::MissingTarget("account"));
        }
        if remote_base.trim().is_empty() {
            return Err(PublishError::MissingTarget("remote base"));
        }
        Ok(Self {
            account: account.trim().to_string(),
            remote_base: remote_base.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Blank keys fall back to the defaults.
    pub fn merged(&self, account: Option<&str>, remote_base: Option<&str>) -> Self {
        let pick = |v: Option<&str>, current: &str| match v {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => current.to_string(),
        };
        Self {
            account: pick(account, &self.account),
            remote_base: pick(remote_base, &self.remote_base),
        }
    }

    pub fn remote_path(&self, slug: &str) -> String {
        format!("{}/{}.module", self.remote_base, slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub account: String,
    pub remote_base: String,
    pub slug: String,
    pub files: GeneratedFiles,
}

impl PublishRequest {
    pub fn from_bundle(target: &PublishTarget, bundle: &ModuleBundle) -> Self {
        Self {
            account: target.account.clone(),
            remote_base: target.remote_base.clone(),
            slug: bundle.slug.clone(),
            files: bundle.files.clone(),
        }
    }

    pub fn check(&self) -> Result<(), PublishError> {
        PublishTarget::new(&self.account, &self.remote_base)?;
        if self.slug.trim().is_empty() {
            return Err(PublishError::MissingSlug);
        }
        for rel in self.files.keys() {
            if !is_contained_path(rel) {
                return Err(PublishError::InvalidPath(rel.clone()));
            }
        }
        Ok(())
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}.module", self.remote_base, self.slug)
    }

    /// First top-level folder ending in `.module`.
    pub fn module_folder(&self) -> Option<String> {
        self.files
            .keys()
            .filter_map(|p| p.replace('\\', "/").split('/').next().map(str::to_string))
            .find(|first| first.ends_with(".module"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub ok: bool,
    pub logs: Vec<String>,
}

/// Transport that delivers a bundle to the platform.
pub trait Publisher {
    fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError>;
}

/// Stages files in a temp dir and runs `<bin> cms upload`.
pub struct CliPublisher {
    cli_bin: String,
}

impl CliPublisher {
    pub fn new(cli_bin: impl Into<String>) -> Self {
        Self { cli_bin: cli_bin.into() }
    }
}

impl Default for CliPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CLI_BIN)
    }
}

impl Publisher for CliPublisher {
    fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        request.check()?;

        let staging = tempfile::Builder::new().prefix("msb-").tempdir()?;
        for (rel, content) in &request.files {
            let path = staging.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
        }

        let Some(folder) = request.module_folder() else {
            return Ok(PublishOutcome {
                ok: false,
                logs: vec!["No .module folder found in files payload.".to_string()],
            });
        };

        let local = staging.path().join(&folder);
        let args = vec![
            "cms".to_string(),
            "upload".to_string(),
            local.display().to_string(),
            request.remote_path(),
            format!("--account={}", request.account),
        ];

        let mut logs = vec![format!("> {} {}", self.cli_bin, args.join(" "))];
        let output = Command::new(&self.cli_bin)
            .args(&args)
            .output()
            .map_err(|source| PublishError::Spawn {
                bin: self.cli_bin.clone(),
                source,
            })?;

        for stream in [&output.stdout, &output.stderr] {
            logs.extend(
                String::from_utf8_lossy(stream)
                    .lines()
                    .map(|l| l.trim_end().to_string())
                    .filter(|l| !l.is_empty()),
            );
        }

        let ok = output.status.success();
        if ok {
            info!(remote = %request.remote_path(), "published module");
        } else {
            warn!(remote = %request.remote_path(), status = ?output.status.code(), "publish failed");
        }
        Ok(PublishOutcome { ok, logs })
    }
}
