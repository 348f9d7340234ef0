//! Hashing - SHA-256 over canonical JSON
//!
//! Bundles and specs hash the same regardless of map key order, so two
//! exports of the same document carry the same content hash.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codegen::GeneratedFiles;
use crate::spec::ModuleSpec;

/// SHA-256 of bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compact JSON with keys in sorted order.
///
/// `serde_json::Map` is ordered by key as long as `preserve_order` stays
/// off, so a round trip through `Value` is enough.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&serde_json::to_value(value)?)
}

/// Content hash of a generated file set.
pub fn compute_bundle_hash(files: &GeneratedFiles) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(files)?.as_bytes()))
}

/// Fingerprint of a document, used to tell whether a stored snapshot changed.
pub fn compute_spec_hash(spec: &ModuleSpec) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(spec)?.as_bytes()))
}
