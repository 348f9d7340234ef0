//! Snapshot Store - JSON persistence for the working document
//!
//! Two ways back in:
//! - [`SpecStore::load_draft`] returns whatever was saved, checked only
//!   for structure, so an unfinished edit can continue.
//! - [`SpecStore::restore`] additionally runs the validator and refuses
//!   a snapshot with any issue.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::editor::EditorSession;
use crate::hashing::compute_spec_hash;
use crate::publish::PublishTarget;
use crate::spec::{ModuleSpec, SpecError};
use crate::validation::{ValidationIssue, Validator};

pub const SPEC_FILE: &str = "spec.json";
pub const PUBLISH_TARGET_FILE: &str = "publish-target.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("No saved spec at {0}")]
    NotFound(PathBuf),

    #[error("Saved spec has {} validation issue(s)", .0.len())]
    Rejected(Vec<ValidationIssue>),
}

pub struct SpecStore {
    dir: PathBuf,
}

impl SpecStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn spec_path(&self) -> PathBuf {
        self.dir.join(SPEC_FILE)
    }

    pub fn has_spec(&self) -> bool {
        self.spec_path().exists()
    }

    /// Write the document unless the stored copy has the same fingerprint.
    /// Returns whether the file was written.
    pub fn save_spec(&self, spec: &ModuleSpec) -> Result<bool, StoreError> {
        let path = self.spec_path();
        let fingerprint = compute_spec_hash(spec).map_err(SpecError::from)?;
        if self.stored_fingerprint().as_deref() == Some(fingerprint.as_str()) {
            debug!(path = %path.display(), "spec unchanged");
            return Ok(false);
        }
        let raw = spec.to_json_pretty()?;
        self.write_atomic(&path, raw.as_bytes())?;
        debug!(path = %path.display(), hash = %fingerprint, "saved spec");
        Ok(true)
    }

    /// Fingerprint of the stored document, if one parses.
    fn stored_fingerprint(&self) -> Option<String> {
        let raw = fs::read_to_string(self.spec_path()).ok()?;
        let stored = ModuleSpec::from_json(&raw).ok()?;
        compute_spec_hash(&stored).ok()
    }

    /// Saved document, structurally checked but not validated.
    pub fn load_draft(&self) -> Result<ModuleSpec, StoreError> {
        let path = self.spec_path();
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(ModuleSpec::from_json(&raw)?)
    }

    /// Saved document, only if it validates cleanly.
    pub fn restore(&self, validator: &Validator) -> Result<ModuleSpec, StoreError> {
        let spec = self.load_draft()?;
        let issues = validator.validate(&spec);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "rejected saved spec");
            return Err(StoreError::Rejected(issues));
        }
        info!(slug = %spec.module.slug, "restored saved spec");
        Ok(spec)
    }

    /// Restore into a session. On any failure the session is left as is.
    pub fn restore_into(&self, session: &mut EditorSession) -> Result<(), StoreError> {
        let spec = self.load_draft()?;
        session
            .restore(spec)
            .map_err(|rejected| StoreError::Rejected(rejected.issues))
    }

    pub fn save_publish_target(&self, target: &PublishTarget) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(target).map_err(SpecError::from)?;
        self.write_atomic(&self.dir.join(PUBLISH_TARGET_FILE), raw.as_bytes())
    }

    /// Saved publish target; defaults when missing or unreadable, blank
    /// keys fall back individually.
    pub fn load_publish_target(&self) -> PublishTarget {
        let path = self.dir.join(PUBLISH_TARGET_FILE);
        let saved = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<PublishTarget>(&raw).ok());
        match saved {
            Some(t) => PublishTarget::default().merged(Some(&t.account), Some(&t.remote_base)),
            None => PublishTarget::default(),
        }
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(data).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldType;

    #[test]
    fn test_draft_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path().join("state"));
        assert!(matches!(store.load_draft(), Err(StoreError::NotFound(_))));

        let spec = ModuleSpec::new_default();
        store.save_spec(&spec).unwrap();
        assert_eq!(store.load_draft().unwrap(), spec);
    }

    #[test]
    fn test_restore_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        store.save_spec(&ModuleSpec::new_default()).unwrap();

        match store.restore(&Validator::new()) {
            Err(StoreError::Rejected(issues)) => assert_eq!(issues.len(), 1),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_restore_into_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());

        let mut source = EditorSession::new();
        source.select_node(Some("content".into()));
        let field = source.add_field(FieldType::Text);
        let slot = source.add_slot_to_selected().unwrap();
        source.update_slot_binding(&slot, Some(field));
        store.save_spec(source.spec()).unwrap();

        let mut target = EditorSession::new();
        store.restore_into(&mut target).unwrap();
        assert_eq!(target.spec(), source.spec());
    }

    #[test]
    fn test_unknown_variant_in_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        let raw = ModuleSpec::new_default()
            .to_json_pretty()
            .unwrap()
            .replace("\"stack\"", "\"grid\"");
        fs::write(store.spec_path(), raw).unwrap();

        match store.load_draft() {
            Err(StoreError::Spec(SpecError::UnhandledVariant { value, .. })) => assert_eq!(value, "grid"),
            other => panic!("expected unhandled variant, got {other:?}"),
        }
    }

    #[test]
    fn test_unchanged_spec_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        let mut spec = ModuleSpec::new_default();

        assert!(store.save_spec(&spec).unwrap());
        assert!(!store.save_spec(&spec.clone()).unwrap());

        spec.module.name = "Hero".into();
        assert!(store.save_spec(&spec).unwrap());
        assert_eq!(store.load_draft().unwrap(), spec);

        fs::write(store.spec_path(), "not json").unwrap();
        assert!(store.save_spec(&spec).unwrap());
        assert_eq!(store.load_draft().unwrap(), spec);
    }

    #[test]
    fn test_restore_rejects_reused_node_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());

        let mut source = EditorSession::new();
        source.select_node(Some("content".into()));
        let field = source.add_field(FieldType::Text);
        let slot = source.add_slot_to_selected().unwrap();
        source.update_slot_binding(&slot, Some(field));
        let raw = source
            .spec()
            .to_json_pretty()
            .unwrap()
            .replace(&format!("\"{slot}\""), "\"content\"");
        fs::write(store.spec_path(), raw).unwrap();

        let mut target = EditorSession::new();
        match store.restore_into(&mut target) {
            Err(StoreError::Spec(SpecError::DuplicateNodeId(id))) => assert_eq!(id, "content"),
            other => panic!("expected duplicate node id, got {other:?}"),
        }
        assert_eq!(target.spec(), &ModuleSpec::new_default());
    }

    #[test]
    fn test_publish_target_defaults_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpecStore::new(dir.path());
        assert_eq!(store.load_publish_target(), PublishTarget::default());

        let target = PublishTarget::new("acme", "mods").unwrap();
        store.save_publish_target(&target).unwrap();
        assert_eq!(store.load_publish_target(), target);
    }
}
