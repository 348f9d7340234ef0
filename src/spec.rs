//! Document Model - Fields, Layout Tree, Module Spec
//!
//! Pure data. Every discriminator is a closed sum type; text that names a
//! variant is parsed through `FromStr`, which refuses unknown tags with
//! [`SpecError::UnhandledVariant`] instead of guessing a fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type FieldId = String;
pub type NodeId = String;

/// Format tag written into every new document.
pub const SPEC_VERSION: &str = "1.0";

/// Format tags this engine can read.
pub const SUPPORTED_SPEC_VERSIONS: &str = "^1.0";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Unhandled {kind} variant: {value}")]
    UnhandledVariant { kind: &'static str, value: String },

    #[error("Spec version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("Duplicate layout node id: {0}")]
    DuplicateNodeId(String),

    #[error("Malformed spec: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fresh opaque identifier for fields and layout nodes.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// --- Fields ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Boolean,
    Image,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Image => "image",
        }
    }

    pub fn all() -> &'static [FieldType] {
        &[FieldType::Text, FieldType::Boolean, FieldType::Image]
    }

    /// Name given to a freshly added field before collision suffixing.
    pub fn base_name(&self) -> &'static str {
        match self {
            FieldType::Text => "headline",
            FieldType::Boolean => "boolean",
            FieldType::Image => "image",
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            FieldType::Text => "Headline",
            FieldType::Boolean => "Boolean",
            FieldType::Image => "Image",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SpecError::UnhandledVariant {
                kind: "field type",
                value: s.to_string(),
            })
    }
}

/// Variant-specific attributes of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    #[serde(rename_all = "camelCase")]
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_alt: Option<String>,
    },
}

impl FieldKind {
    /// Defaults installed by `addField` and by a re-variant.
    pub fn defaults(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => FieldKind::Text {
                default_value: Some(String::new()),
                max_length: None,
            },
            FieldType::Boolean => FieldKind::Boolean {
                default_value: Some(false),
            },
            FieldType::Image => FieldKind::Image { default_alt: None },
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Text { .. } => FieldType::Text,
            FieldKind::Boolean { .. } => FieldType::Boolean,
            FieldKind::Image { .. } => FieldType::Image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(field_type: FieldType, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            label: label.into(),
            required: false,
            kind: FieldKind::defaults(field_type),
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// Copy of this field under another variant.
    ///
    /// Lossy: keeps id, name, label and required; every variant-specific
    /// attribute is dropped and replaced by the new variant's defaults,
    /// even when `field_type` equals the current type.
    pub fn retyped(&self, field_type: FieldType) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            label: self.label.clone(),
            required: self.required,
            kind: FieldKind::defaults(field_type),
        }
    }
}

/// Normalize free text into a template identifier: lowercase, anything
/// outside `[a-z0-9_]` becomes `_`, runs of `_` collapse, edges trimmed.
pub fn sanitize_field_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

// --- Module metadata ---

/// Target placement kinds a module can be offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    SitePage,
    LandingPage,
    BlogPost,
    BlogListing,
    Email,
    CustomerPortal,
    WebInteractive,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::SitePage => "SITE_PAGE",
            ContentType::LandingPage => "LANDING_PAGE",
            ContentType::BlogPost => "BLOG_POST",
            ContentType::BlogListing => "BLOG_LISTING",
            ContentType::Email => "EMAIL",
            ContentType::CustomerPortal => "CUSTOMER_PORTAL",
            ContentType::WebInteractive => "WEB_INTERACTIVE",
        }
    }

    pub fn all() -> &'static [ContentType] {
        &[
            ContentType::SitePage,
            ContentType::LandingPage,
            ContentType::BlogPost,
            ContentType::BlogListing,
            ContentType::Email,
            ContentType::CustomerPortal,
            ContentType::WebInteractive,
        ]
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SpecError::UnhandledVariant {
                kind: "content type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMeta {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub content_types: BTreeSet<ContentType>,
}

// --- Layout ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Section,
    Stack,
    Slot,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Section => "section",
            NodeKind::Stack => "stack",
            NodeKind::Slot => "slot",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "section" => Ok(NodeKind::Section),
            "stack" => Ok(NodeKind::Stack),
            "slot" => Ok(NodeKind::Slot),
            other => Err(SpecError::UnhandledVariant {
                kind: "layout node",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub children: Vec<LayoutNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Non-owning reference to a [`Field`] by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_field_id: Option<FieldId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutNode {
    Section(Container),
    Stack(Container),
    Slot(Slot),
}

impl LayoutNode {
    pub fn section(id: impl Into<NodeId>, title: Option<&str>, children: Vec<LayoutNode>) -> Self {
        LayoutNode::Section(Container {
            id: id.into(),
            title: title.map(str::to_string),
            children,
        })
    }

    pub fn stack(id: impl Into<NodeId>, title: Option<&str>, children: Vec<LayoutNode>) -> Self {
        LayoutNode::Stack(Container {
            id: id.into(),
            title: title.map(str::to_string),
            children,
        })
    }

    pub fn slot(id: impl Into<NodeId>, title: Option<&str>, bind_field_id: Option<FieldId>) -> Self {
        LayoutNode::Slot(Slot {
            id: id.into(),
            title: title.map(str::to_string),
            bind_field_id,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            LayoutNode::Section(c) | LayoutNode::Stack(c) => &c.id,
            LayoutNode::Slot(s) => &s.id,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            LayoutNode::Section(c) | LayoutNode::Stack(c) => c.title.as_deref(),
            LayoutNode::Slot(s) => s.title.as_deref(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            LayoutNode::Section(_) => NodeKind::Section,
            LayoutNode::Stack(_) => NodeKind::Stack,
            LayoutNode::Slot(_) => NodeKind::Slot,
        }
    }

    /// Ordered children; always empty for a slot.
    pub fn children(&self) -> &[LayoutNode] {
        match self {
            LayoutNode::Section(c) | LayoutNode::Stack(c) => &c.children,
            LayoutNode::Slot(_) => &[],
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, LayoutNode::Slot(_))
    }

    /// Same node with its children replaced. Slots are returned unchanged.
    pub fn with_children(self, children: Vec<LayoutNode>) -> Self {
        match self {
            LayoutNode::Section(c) => LayoutNode::Section(Container { children, ..c }),
            LayoutNode::Stack(c) => LayoutNode::Stack(Container { children, ..c }),
            slot @ LayoutNode::Slot(_) => slot,
        }
    }
}

// --- Aggregate root ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    pub spec_version: String,
    pub module: ModuleMeta,
    #[serde(default)]
    pub fields: Vec<Field>,
    pub layout: LayoutNode,
}

impl ModuleSpec {
    /// Minimal well-formed document: one root section holding one empty
    /// stack, no fields.
    pub fn new_default() -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            module: ModuleMeta {
                name: "New Module".to_string(),
                slug: "new-module".to_string(),
                content_types: [ContentType::SitePage, ContentType::LandingPage]
                    .into_iter()
                    .collect(),
            },
            fields: vec![],
            layout: LayoutNode::section(
                "root",
                None,
                vec![LayoutNode::stack("content", Some("content"), vec![])],
            ),
        }
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn to_json_pretty(&self) -> Result<String, SpecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a persisted snapshot.
    ///
    /// Every discriminator is checked before typed decoding so an unknown
    /// tag surfaces as [`SpecError::UnhandledVariant`] with the offending
    /// value, and a reused node id as [`SpecError::DuplicateNodeId`]. The
    /// result is structurally sound but NOT validated.
    pub fn from_json(raw: &str) -> Result<Self, SpecError> {
        let value: Value = serde_json::from_str(raw)?;
        check_discriminators(&value)?;
        let spec: ModuleSpec = serde_json::from_value(value)?;
        check_spec_version(&spec.spec_version)?;
        Ok(spec)
    }
}

impl Default for ModuleSpec {
    fn default() -> Self {
        Self::new_default()
    }
}

/// Accepts `major.minor` tags (and full semver) within [`SUPPORTED_SPEC_VERSIONS`].
pub fn check_spec_version(found: &str) -> Result<(), SpecError> {
    let unsupported = || SpecError::UnsupportedVersion {
        found: found.to_string(),
        expected: SUPPORTED_SPEC_VERSIONS.to_string(),
    };
    let normalized = match found.split('.').count() {
        2 => format!("{found}.0"),
        _ => found.to_string(),
    };
    let version = semver::Version::parse(&normalized).map_err(|_| unsupported())?;
    let req = semver::VersionReq::parse(SUPPORTED_SPEC_VERSIONS).map_err(|_| unsupported())?;
    if req.matches(&version) {
        Ok(())
    } else {
        Err(unsupported())
    }
}

fn check_discriminators(value: &Value) -> Result<(), SpecError> {
    if let Some(fields) = value.get("fields").and_then(Value::as_array) {
        for field in fields {
            if let Some(tag) = field.get("type").and_then(Value::as_str) {
                FieldType::from_str(tag)?;
            }
        }
    }
    if let Some(types) = value
        .get("module")
        .and_then(|m| m.get("contentTypes"))
        .and_then(Value::as_array)
    {
        for tag in types.iter().filter_map(Value::as_str) {
            ContentType::from_str(tag)?;
        }
    }
    if let Some(layout) = value.get("layout") {
        check_node_kinds(layout, &mut HashSet::new())?;
    }
    Ok(())
}

fn check_node_kinds<'a>(node: &'a Value, seen: &mut HashSet<&'a str>) -> Result<(), SpecError> {
    if let Some(tag) = node.get("kind").and_then(Value::as_str) {
        NodeKind::from_str(tag)?;
    }
    if let Some(id) = node.get("id").and_then(Value::as_str) {
        if !seen.insert(id) {
            return Err(SpecError::DuplicateNodeId(id.to_string()));
        }
    }
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            check_node_kinds(child, seen)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_shape() {
        let spec = ModuleSpec::new_default();
        assert_eq!(spec.spec_version, "1.0");
        assert!(spec.fields.is_empty());
        assert_eq!(spec.layout.id(), "root");
        assert_eq!(spec.layout.kind(), NodeKind::Section);
        assert_eq!(spec.layout.children().len(), 1);
        assert_eq!(spec.layout.children()[0].kind(), NodeKind::Stack);
        assert!(spec.module.content_types.contains(&ContentType::SitePage));
        assert!(spec.module.content_types.contains(&ContentType::LandingPage));
    }

    #[test]
    fn test_field_serializes_with_type_tag() {
        let mut field = Field::new(FieldType::Text, "headline", "Headline");
        field.id = "f1".to_string();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["defaultValue"], "");
        assert_eq!(json["required"], false);
        assert!(json.get("maxLength").is_none());

        let back: Field = serde_json::from_value(json).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_retype_discards_variant_attributes() {
        let mut field = Field::new(FieldType::Text, "title", "Title");
        field.required = true;
        field.kind = FieldKind::Text {
            default_value: Some("Hello".into()),
            max_length: Some(40),
        };

        let image = field.retyped(FieldType::Image);
        assert_eq!(image.id, field.id);
        assert_eq!(image.name, "title");
        assert!(image.required);
        assert_eq!(image.kind, FieldKind::Image { default_alt: None });

        let text = image.retyped(FieldType::Text);
        assert_eq!(text.kind, FieldKind::defaults(FieldType::Text));
    }

    #[test]
    fn test_unknown_field_type_is_fatal() {
        let err = "video".parse::<FieldType>().unwrap_err();
        match err {
            SpecError::UnhandledVariant { kind, value } => {
                assert_eq!(kind, "field type");
                assert_eq!(value, "video");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_json_reports_unknown_node_kind() {
        let raw = r#"{
            "specVersion": "1.0",
            "module": {"name": "m", "slug": "m", "contentTypes": ["SITE_PAGE"]},
            "fields": [],
            "layout": {"kind": "section", "id": "root", "children": [
                {"kind": "carousel", "id": "x"}
            ]}
        }"#;
        let err = ModuleSpec::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("carousel"));
    }

    #[test]
    fn test_from_json_rejects_reused_node_id() {
        let raw = r#"{
            "specVersion": "1.0",
            "module": {"name": "m", "slug": "m", "contentTypes": ["SITE_PAGE"]},
            "fields": [{"id": "f1", "name": "headline", "label": "Headline", "type": "text"}],
            "layout": {"kind": "section", "id": "root", "children": [
                {"kind": "slot", "id": "dup", "bindFieldId": "f1"},
                {"kind": "stack", "id": "dup", "children": []}
            ]}
        }"#;
        match ModuleSpec::from_json(raw) {
            Err(SpecError::DuplicateNodeId(id)) => assert_eq!(id, "dup"),
            other => panic!("expected duplicate node id, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_round_trips_default() {
        let spec = ModuleSpec::new_default();
        let raw = spec.to_json_pretty().unwrap();
        assert_eq!(ModuleSpec::from_json(&raw).unwrap(), spec);
    }

    #[test]
    fn test_spec_version_check() {
        assert!(check_spec_version("1.0").is_ok());
        assert!(check_spec_version("1.3").is_ok());
        assert!(check_spec_version("2.0").is_err());
        assert!(check_spec_version("latest").is_err());
    }

    #[test]
    fn test_sanitize_field_name() {
        assert_eq!(sanitize_field_name("Hero Title!"), "hero_title");
        assert_eq!(sanitize_field_name("__a--b__"), "a_b");
        assert_eq!(sanitize_field_name("CTA 2"), "cta_2");
    }
}
