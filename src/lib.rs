//! Module Spec Engine
//!
//! A module is described as data (fields plus a layout tree bound to those
//! fields) and compiled into the file set a content platform loads.
//!
//! # Ground Rules
//! 1. The Spec Is Truth: files are derived, never edited
//! 2. Variants Are Closed: an unknown tag is a fatal error, not a fallback
//! 3. Validation Reports, Export Enforces
//! 4. Deterministic Output
//! 5. Edits Never Throw: a stale id is a no-op

pub mod codegen;
pub mod config;
pub mod editor;
pub mod hashing;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod spec;
pub mod store;
pub mod tree;
pub mod validation;

pub use codegen::{generate, FieldDescriptor, GeneratedFiles};
pub use config::BuilderConfig;
pub use editor::{EditorSession, FieldPatch, ModulePatch};
pub use hashing::{canonical_json, compute_bundle_hash};
pub use pipeline::{ExportError, ExportPipeline, ModuleBundle};
pub use publish::{CliPublisher, PublishOutcome, PublishRequest, PublishTarget, Publisher};
pub use spec::{ContentType, Field, FieldKind, FieldType, LayoutNode, ModuleSpec, SpecError};
pub use store::SpecStore;
pub use validation::{validate, ValidationIssue, ValidationRule, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
