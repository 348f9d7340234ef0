//! Export Pipeline - Single Entry Point
//!
//! CRITICAL: export MUST call validate internally. No bypass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::codegen::{self, GeneratedFiles};
use crate::hashing::compute_bundle_hash;
use crate::spec::ModuleSpec;
use crate::validation::{ValidationIssue, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<ValidationIssue>),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generated path escapes the output directory: {0}")]
    UnsafePath(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Generated files plus the manifest describing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBundle {
    pub id: String,
    pub slug: String,
    pub engine_version: String,
    pub spec_version: String,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub files: GeneratedFiles,
}

impl ModuleBundle {
    /// Suggested archive name for packagers.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.slug)
    }

    /// Write every file under `dir`, creating folders as needed.
    /// Returns the written paths in file-map order. Nothing is written if
    /// any path would land outside `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        if let Some(rel) = self.files.keys().find(|rel| !codegen::is_contained_path(rel)) {
            warn!(path = %rel, "refusing to write outside output directory");
            return Err(ExportError::UnsafePath(rel.clone()));
        }
        let mut written = vec![];
        for (rel, content) in &self.files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| ExportError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, content).map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}

/// The export pipeline - single entry point for producing module files
pub struct ExportPipeline {
    validator: Validator,
}

impl ExportPipeline {
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }

    /// This is the ONLY validation entry point of the pipeline.
    pub fn validate(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(spec)
    }

    /// Export a spec.
    ///
    /// CRITICAL: This ALWAYS calls validate internally. No bypass possible.
    pub fn export(&self, spec: &ModuleSpec) -> Result<ModuleBundle, ExportError> {
        let issues = self.validate(spec);
        if !issues.is_empty() {
            warn!(slug = %spec.module.slug, issues = issues.len(), "export blocked by validation");
            return Err(ExportError::ValidationFailed(issues));
        }

        let files = codegen::generate(spec)?;
        let content_hash = compute_bundle_hash(&files)?;

        let bundle = ModuleBundle {
            id: Uuid::new_v4().to_string(),
            slug: spec.module.slug.trim().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            spec_version: spec.spec_version.clone(),
            created_at: Utc::now(),
            content_hash,
            files,
        };
        info!(slug = %bundle.slug, files = bundle.files.len(), hash = %bundle.content_hash, "exported module");
        Ok(bundle)
    }
}

impl Default for ExportPipeline {
    fn default() -> Self {
        Self::new(Validator::default())
    }
}
