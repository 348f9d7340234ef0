//! Builder configuration, read from `modspec.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::publish::{PublishTarget, DEFAULT_ACCOUNT, DEFAULT_CLI_BIN, DEFAULT_REMOTE_BASE};
use crate::spec::ContentType;
use crate::validation::{DisallowedContentTypeRule, ValidationRule, Validator};

pub const DEFAULT_CONFIG_FILE: &str = "modspec.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BuilderConfig {
    pub publish: PublishConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub account: String,
    pub remote_base: String,
    /// Upload CLI executable.
    pub cli_bin: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            remote_base: DEFAULT_REMOTE_BASE.to_string(),
            cli_bin: DEFAULT_CLI_BIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Content types refused until the platform supports them.
    /// Empty disables the policy.
    pub disallowed_content_types: Vec<ContentType>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            disallowed_content_types: vec![ContentType::Email],
        }
    }
}

impl BuilderConfig {
    /// Load from `path`. A missing file yields defaults; a malformed one
    /// is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn publish_target(&self) -> PublishTarget {
        PublishTarget::default().merged(Some(&self.publish.account), Some(&self.publish.remote_base))
    }

    /// Validator carrying the configured content-type policy.
    pub fn validator(&self) -> Validator {
        let disallowed = &self.validation.disallowed_content_types;
        let policy: Option<Box<dyn ValidationRule>> = if disallowed.is_empty() {
            None
        } else {
            Some(Box::new(DisallowedContentTypeRule::new(disallowed.iter().copied())))
        };
        Validator::new().with_policy(policy)
    }
}
