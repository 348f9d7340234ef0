//! Editor Session - the single owner of the live document
//!
//! Every edit builds a brand-new [`ModuleSpec`] and swaps it in. Snapshots
//! handed out through [`EditorSession::snapshot`] are never touched again,
//! so an export can run against one while editing continues.
//!
//! Edits that target a missing or incompatible id are silent no-ops.
//! Validation is a derived read, never a gate on mutation.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::spec::{
    new_id, ContentType, Field, FieldId, FieldKind, FieldType, LayoutNode, ModuleSpec, NodeId,
};
use crate::tree;
use crate::validation::{ValidationIssue, Validator};

/// Shallow patch over module metadata. `None` leaves a key untouched.
#[derive(Debug, Clone, Default)]
pub struct ModulePatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub content_types: Option<BTreeSet<ContentType>>,
}

/// Patch over a field.
///
/// Common keys always apply. Variant keys apply only when the field
/// currently has that variant; they never change the variant (use
/// [`EditorSession::replace_field_type`] for that).
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub label: Option<String>,
    pub required: Option<bool>,
    pub text_default: Option<Option<String>>,
    pub max_length: Option<Option<u32>>,
    pub boolean_default: Option<Option<bool>>,
    pub default_alt: Option<Option<String>>,
}

impl FieldPatch {
    fn apply(&self, field: &Field) -> Field {
        let mut next = field.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(label) = &self.label {
            next.label = label.clone();
        }
        if let Some(required) = self.required {
            next.required = required;
        }
        match &mut next.kind {
            FieldKind::Text { default_value, max_length } => {
                if let Some(v) = &self.text_default {
                    *default_value = v.clone();
                }
                if let Some(v) = self.max_length {
                    *max_length = v;
                }
            }
            FieldKind::Boolean { default_value } => {
                if let Some(v) = self.boolean_default {
                    *default_value = v;
                }
            }
            FieldKind::Image { default_alt } => {
                if let Some(v) = &self.default_alt {
                    *default_alt = v.clone();
                }
            }
        }
        next
    }
}

/// Why a restore was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRejected {
    pub issues: Vec<ValidationIssue>,
}

pub struct EditorSession {
    spec: Arc<ModuleSpec>,
    selected_field_id: Option<FieldId>,
    selected_node_id: Option<NodeId>,
    validator: Validator,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::with_validator(Validator::new())
    }

    pub fn with_validator(validator: Validator) -> Self {
        Self {
            spec: Arc::new(ModuleSpec::new_default()),
            selected_field_id: None,
            selected_node_id: None,
            validator,
        }
    }

    // --- Reads ---

    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    /// Immutable handle to the current document.
    pub fn snapshot(&self) -> Arc<ModuleSpec> {
        Arc::clone(&self.spec)
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.validator.validate(&self.spec)
    }

    pub fn has_issues(&self) -> bool {
        !self.issues().is_empty()
    }

    pub fn selected_field_id(&self) -> Option<&str> {
        self.selected_field_id.as_deref()
    }

    pub fn selected_node_id(&self) -> Option<&str> {
        self.selected_node_id.as_deref()
    }

    pub fn selected_field(&self) -> Option<&Field> {
        self.selected_field_id.as_deref().and_then(|id| self.spec.field(id))
    }

    pub fn selected_node(&self) -> Option<&LayoutNode> {
        self.selected_node_id
            .as_deref()
            .and_then(|id| tree::find_by_id(&self.spec.layout, id))
    }

    // --- Selection ---

    pub fn select_field(&mut self, id: Option<FieldId>) {
        self.selected_field_id = id;
    }

    pub fn select_node(&mut self, id: Option<NodeId>) {
        self.selected_node_id = id;
    }

    // --- Document lifecycle ---

    /// Replace the document wholesale. No validation is applied.
    pub fn set_spec(&mut self, next: ModuleSpec) {
        if let Some(selected) = &self.selected_field_id {
            if next.field(selected).is_none() {
                self.selected_field_id = None;
            }
        }
        self.spec = Arc::new(next);
    }

    pub fn reset_spec(&mut self) {
        debug!("reset spec to defaults");
        self.set_spec(ModuleSpec::new_default());
    }

    /// Install a persisted snapshot only if it validates cleanly.
    pub fn restore(&mut self, snapshot: ModuleSpec) -> Result<(), RestoreRejected> {
        let issues = self.validator.validate(&snapshot);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "refusing to restore invalid spec");
            return Err(RestoreRejected { issues });
        }
        info!(slug = %snapshot.module.slug, "restored spec");
        self.set_spec(snapshot);
        Ok(())
    }

    fn commit(&mut self, next: ModuleSpec) {
        self.spec = Arc::new(next);
    }

    // --- Module ---

    pub fn update_module(&mut self, patch: ModulePatch) {
        let mut next = (*self.spec).clone();
        if let Some(name) = patch.name {
            next.module.name = name;
        }
        if let Some(slug) = patch.slug {
            next.module.slug = slug;
        }
        if let Some(content_types) = patch.content_types {
            next.module.content_types = content_types;
        }
        debug!(slug = %next.module.slug, "updated module metadata");
        self.commit(next);
    }

    // --- Fields ---

    /// Append a field of `field_type` with a collision-free name and
    /// select it. Returns the new field's id.
    pub fn add_field(&mut self, field_type: FieldType) -> FieldId {
        let name = self.unique_field_name(field_type.base_name());
        let field = Field::new(field_type, name, field_type.default_label());
        let id = field.id.clone();

        let mut next = (*self.spec).clone();
        debug!(field = %field.name, %field_type, "added field");
        next.fields.push(field);
        self.commit(next);

        self.selected_field_id = Some(id.clone());
        id
    }

    pub fn update_field(&mut self, id: &str, patch: &FieldPatch) {
        if self.spec.field(id).is_none() {
            return;
        }
        let mut next = (*self.spec).clone();
        next.fields = next
            .fields
            .iter()
            .map(|f| if f.id == id { patch.apply(f) } else { f.clone() })
            .collect();
        debug!(field_id = id, "updated field");
        self.commit(next);
    }

    /// Destructive re-variant. Keeps id, name, label and required; every
    /// variant-specific attribute (defaults, max length, alt text) is
    /// discarded and replaced by the new variant's defaults, even when the
    /// type does not change.
    pub fn replace_field_type(&mut self, id: &str, next_type: FieldType) {
        if self.spec.field(id).is_none() {
            return;
        }
        let mut next = (*self.spec).clone();
        next.fields = next
            .fields
            .iter()
            .map(|f| if f.id == id { f.retyped(next_type) } else { f.clone() })
            .collect();
        debug!(field_id = id, %next_type, "replaced field type");
        self.commit(next);
    }

    /// Remove a field. Slots bound to it keep their (now dangling) id so
    /// the binding recovers if a field with that id comes back.
    pub fn remove_field(&mut self, id: &str) {
        let mut next = (*self.spec).clone();
        let before = next.fields.len();
        next.fields.retain(|f| f.id != id);
        if next.fields.len() == before {
            return;
        }
        debug!(field_id = id, "removed field");
        self.commit(next);

        if self.selected_field_id.as_deref() == Some(id) {
            self.selected_field_id = None;
        }
    }

    fn unique_field_name(&self, base: &str) -> String {
        let taken: HashSet<&str> = self.spec.fields.iter().map(|f| f.name.as_str()).collect();
        let mut name = base.to_string();
        let mut i = 1;
        while taken.contains(name.as_str()) {
            i += 1;
            name = format!("{base}_{i}");
        }
        name
    }

    // --- Layout ---

    /// Append an unbound slot under the selected node and select it.
    /// Returns the new slot id, or `None` when nothing was added.
    pub fn add_slot_to_selected(&mut self) -> Option<NodeId> {
        self.add_to_selected(LayoutNode::slot(new_id(), Some("slot"), None))
    }

    /// Append an empty stack under the selected node and select it.
    pub fn add_stack_to_selected(&mut self) -> Option<NodeId> {
        self.add_to_selected(LayoutNode::stack(new_id(), Some("stack"), vec![]))
    }

    fn add_to_selected(&mut self, child: LayoutNode) -> Option<NodeId> {
        let target = self.selected_node()?;
        if !target.is_container() {
            return None;
        }
        let target_id = target.id().to_string();
        let child_id = child.id().to_string();

        let mut next = (*self.spec).clone();
        debug!(parent = %target_id, kind = %child.kind(), "added layout node");
        next.layout = tree::insert_child(&self.spec.layout, &target_id, child);
        self.commit(next);

        self.selected_node_id = Some(child_id.clone());
        Some(child_id)
    }

    /// Point a slot at a field (or unbind it with `None`). The field id is
    /// not checked here; a dangling binding is a validation issue.
    pub fn update_slot_binding(&mut self, slot_id: &str, field_id: Option<FieldId>) {
        match tree::find_by_id(&self.spec.layout, slot_id) {
            Some(LayoutNode::Slot(_)) => {}
            _ => return,
        }
        let mut next = (*self.spec).clone();
        next.layout = tree::map_tree(&self.spec.layout, &mut |node| match node {
            LayoutNode::Slot(slot) if slot.id == slot_id => {
                let mut slot = slot.clone();
                slot.bind_field_id = field_id.clone();
                LayoutNode::Slot(slot)
            }
            other => other.clone(),
        });
        debug!(slot_id, "updated slot binding");
        self.commit(next);
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}
