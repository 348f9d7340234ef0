//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured issues. The validator runs them in a fixed
//! order so the issue list is reproducible for identical input. The
//! content-type policy is a separate, replaceable rule.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::spec::{ContentType, LayoutNode, ModuleSpec};
use crate::tree::{self, ROOT_PATH};

static FIELD_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z][a-z0-9_]*$").unwrap_or_else(|e| panic!("invalid field name pattern: {e}"))
});

/// One violated rule, addressed by a dotted path into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validation rule trait - produces issues
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue>;
}

/// True when `name` is usable as a template identifier.
pub fn is_valid_field_name(name: &str) -> bool {
    FIELD_NAME_PATTERN.is_match(name)
}

// --- Concrete Rules ---

pub struct ModuleNameRule;

impl ValidationRule for ModuleNameRule {
    fn name(&self) -> &'static str { "module_name" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        if spec.module.name.trim().is_empty() {
            vec![ValidationIssue::new("module.name", "Name is required.")]
        } else {
            vec![]
        }
    }
}

pub struct ModuleSlugRule;

impl ValidationRule for ModuleSlugRule {
    fn name(&self) -> &'static str { "module_slug" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        if spec.module.slug.trim().is_empty() {
            vec![ValidationIssue::new("module.slug", "Slug is required.")]
        } else {
            vec![]
        }
    }
}

pub struct ContentTypesRule;

impl ValidationRule for ContentTypesRule {
    fn name(&self) -> &'static str { "content_types" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        if spec.module.content_types.is_empty() {
            vec![ValidationIssue::new(
                "module.contentTypes",
                "Select at least one content type.",
            )]
        } else {
            vec![]
        }
    }
}

/// Placement restriction for content types the target platform does not
/// fully support yet. One issue per disallowed type present.
pub struct DisallowedContentTypeRule {
    disallowed: Vec<ContentType>,
}

impl DisallowedContentTypeRule {
    pub fn new(disallowed: impl IntoIterator<Item = ContentType>) -> Self {
        let mut disallowed: Vec<_> = disallowed.into_iter().collect();
        disallowed.sort();
        disallowed.dedup();
        Self { disallowed }
    }

    pub fn disallowed(&self) -> &[ContentType] {
        &self.disallowed
    }
}

impl Default for DisallowedContentTypeRule {
    fn default() -> Self {
        Self::new([ContentType::Email])
    }
}

impl ValidationRule for DisallowedContentTypeRule {
    fn name(&self) -> &'static str { "content_type_policy" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        self.disallowed
            .iter()
            .filter(|ct| spec.module.content_types.contains(ct))
            .map(|ct| {
                ValidationIssue::new(
                    "module.contentTypes",
                    format!("Content type {ct} is not supported for modules yet."),
                )
            })
            .collect()
    }
}

pub struct FieldNamesRule;

impl ValidationRule for FieldNamesRule {
    fn name(&self) -> &'static str { "field_names" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        let mut issues = vec![];

        for (i, field) in spec.fields.iter().enumerate() {
            let path = format!("fields[{i}].name");
            if field.name.trim().is_empty() {
                issues.push(ValidationIssue::new(path, "Field name is required."));
            } else if !is_valid_field_name(&field.name) {
                issues.push(ValidationIssue::new(
                    path,
                    format!(
                        "Invalid field name: \"{}\" (use letters, digits and _; start with a letter)",
                        field.name
                    ),
                ));
            }
        }

        // One issue per duplicated name, in order of first appearance.
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for field in &spec.fields {
            *counts.entry(field.name.as_str()).or_default() += 1;
        }
        let mut reported = HashSet::new();
        for field in &spec.fields {
            let name = field.name.as_str();
            if name.trim().is_empty() || counts[name] < 2 || !reported.insert(name) {
                continue;
            }
            issues.push(ValidationIssue::new(
                "fields",
                format!("Duplicate field name: \"{name}\""),
            ));
        }

        issues
    }
}

pub struct SlotBindingRule;

impl ValidationRule for SlotBindingRule {
    fn name(&self) -> &'static str { "slot_binding" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        let field_ids: HashSet<&str> = spec.fields.iter().map(|f| f.id.as_str()).collect();
        let mut issues = vec![];

        tree::walk(&spec.layout, &mut |node, path| {
            let LayoutNode::Slot(slot) = node else { return };
            match slot.bind_field_id.as_deref() {
                None => issues.push(ValidationIssue::new(path, "Slot is not bound to a field.")),
                Some(id) if !field_ids.contains(id) => issues.push(ValidationIssue::new(
                    path,
                    format!("Slot references missing field: \"{id}\""),
                )),
                Some(_) => {}
            }
        });

        issues
    }
}

pub struct SlotPresenceRule;

impl ValidationRule for SlotPresenceRule {
    fn name(&self) -> &'static str { "slot_presence" }

    fn check(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        if tree::slots(&spec.layout).is_empty() {
            vec![ValidationIssue::new(ROOT_PATH, "Add at least one slot.")]
        } else {
            vec![]
        }
    }
}

/// Validator orchestrates rules in their fixed order.
///
/// Order: module name, slug, content types, content-type policy, field
/// names, slot bindings, slot presence.
pub struct Validator {
    metadata: Vec<Box<dyn ValidationRule>>,
    policy: Option<Box<dyn ValidationRule>>,
    structure: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            metadata: vec![
                Box::new(ModuleNameRule),
                Box::new(ModuleSlugRule),
                Box::new(ContentTypesRule),
            ],
            policy: Some(Box::new(DisallowedContentTypeRule::default())),
            structure: vec![
                Box::new(FieldNamesRule),
                Box::new(SlotBindingRule),
                Box::new(SlotPresenceRule),
            ],
        }
    }

    /// Replace the content-type policy; `None` disables it.
    pub fn with_policy(mut self, policy: Option<Box<dyn ValidationRule>>) -> Self {
        self.policy = policy;
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules().map(|r| r.name()).collect()
    }

    fn rules(&self) -> impl Iterator<Item = &dyn ValidationRule> + '_ {
        self.metadata
            .iter()
            .chain(self.policy.iter())
            .chain(self.structure.iter())
            .map(|r| r.as_ref())
    }

    /// Empty result means the document may be exported or published.
    ///
    /// Precondition: `spec.layout` is a real root node, which the document
    /// model guarantees by construction.
    pub fn validate(&self, spec: &ModuleSpec) -> Vec<ValidationIssue> {
        self.rules().flat_map(|rule| rule.check(spec)).collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate with the default rule set.
pub fn validate(spec: &ModuleSpec) -> Vec<ValidationIssue> {
    Validator::new().validate(spec)
}
