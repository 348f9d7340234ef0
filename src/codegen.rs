//! Codegen - validated spec to module files
//!
//! Output lives under `<slug>.module/`:
//! - `fields.json` - field descriptors, parsed by the target platform
//! - `meta.json`   - module label and placement kinds
//! - `module.html` - markup mirroring the layout tree
//!
//! Precondition: the document validates with zero issues. Nothing is
//! re-checked here.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Component, Path};

use crate::spec::{ContentType, Field, FieldKind, LayoutNode, ModuleSpec};

/// Relative path -> file content. Ordered, so iteration is deterministic.
pub type GeneratedFiles = BTreeMap<String, String>;

pub const FIELDS_FILE: &str = "fields.json";
pub const META_FILE: &str = "meta.json";
pub const TEMPLATE_FILE: &str = "module.html";

/// One `fields.json` record. Key order is part of the format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl From<&Field> for FieldDescriptor {
    fn from(field: &Field) -> Self {
        let default = match &field.kind {
            FieldKind::Text { default_value, .. } => {
                Some(Value::String(default_value.clone().unwrap_or_default()))
            }
            FieldKind::Boolean { default_value } => Some(Value::Bool(default_value.unwrap_or(false))),
            FieldKind::Image { .. } => None,
        };
        Self {
            name: field.name.clone(),
            label: field.label.clone(),
            field_type: field.field_type().as_str(),
            required: field.required,
            default,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModuleMetaFile<'a> {
    label: &'a str,
    content_types: Vec<&'static str>,
    global: bool,
    is_available_for_new_content: bool,
    css_assets: Vec<String>,
    external_js: Vec<String>,
    js_assets: Vec<String>,
    other_assets: Vec<String>,
    smart_type: &'static str,
    tags: Vec<String>,
}

/// Folder every generated path is rooted in.
pub fn module_folder(spec: &ModuleSpec) -> String {
    format!("{}.module", spec.module.slug.trim())
}

/// True when `rel` stays inside whatever directory it is joined onto.
pub fn is_contained_path(rel: &str) -> bool {
    Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub fn field_descriptors(spec: &ModuleSpec) -> Vec<FieldDescriptor> {
    spec.fields.iter().map(FieldDescriptor::from).collect()
}

/// Generate the module file set. Same input, byte-identical output.
pub fn generate(spec: &ModuleSpec) -> Result<GeneratedFiles, serde_json::Error> {
    let folder = module_folder(spec);
    let mut files = GeneratedFiles::new();

    files.insert(
        format!("{folder}/{FIELDS_FILE}"),
        pretty_json(&field_descriptors(spec))?,
    );
    files.insert(format!("{folder}/{META_FILE}"), pretty_json(&meta_file(spec))?);
    files.insert(format!("{folder}/{TEMPLATE_FILE}"), render_template(spec));

    Ok(files)
}

fn pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

fn meta_file(spec: &ModuleSpec) -> ModuleMetaFile<'_> {
    ModuleMetaFile {
        label: spec.module.name.trim(),
        content_types: spec.module.content_types.iter().map(ContentType::as_str).collect(),
        global: false,
        is_available_for_new_content: true,
        css_assets: vec![],
        external_js: vec![],
        js_assets: vec![],
        other_assets: vec![],
        smart_type: "NOT_SMART",
        tags: vec![],
    }
}

/// HubL markup for the layout tree. Each bound slot renders its field.
pub fn render_template(spec: &ModuleSpec) -> String {
    let mut out = String::new();
    let slug = escape_html(spec.module.slug.trim());
    let _ = writeln!(out, "<div class=\"msb-module msb-{slug}\">");
    render_node(spec, &spec.layout, 1, &mut out);
    out.push_str("</div>\n");
    out
}

fn render_node(spec: &ModuleSpec, node: &LayoutNode, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let id = escape_html(node.id());
    let title = node
        .title()
        .map(|t| format!(" data-title=\"{}\"", escape_html(t)))
        .unwrap_or_default();

    match node {
        LayoutNode::Section(c) | LayoutNode::Stack(c) => {
            let tag = if matches!(node, LayoutNode::Section(_)) { "section" } else { "div" };
            let _ = writeln!(
                out,
                "{pad}<{tag} class=\"msb-{}\" data-node=\"{id}\"{title}>",
                node.kind()
            );
            for child in &c.children {
                render_node(spec, child, depth + 1, out);
            }
            let _ = writeln!(out, "{pad}</{tag}>");
        }
        LayoutNode::Slot(slot) => {
            let field = slot.bind_field_id.as_deref().and_then(|id| spec.field(id));
            let _ = writeln!(out, "{pad}<div class=\"msb-slot\" data-node=\"{id}\"{title}>");
            if let Some(field) = field {
                let _ = writeln!(out, "{pad}  {}", slot_markup(field));
            }
            let _ = writeln!(out, "{pad}</div>");
        }
    }
}

fn slot_markup(field: &Field) -> String {
    let name = &field.name;
    match field.kind {
        FieldKind::Text { .. } => format!("{{{{ module.{name} }}}}"),
        FieldKind::Boolean { .. } => {
            format!("{{% if module.{name} %}}<span data-field=\"{name}\"></span>{{% endif %}}")
        }
        FieldKind::Image { .. } => format!(
            "{{% if module.{name}.src %}}<img src=\"{{{{ module.{name}.src }}}}\" alt=\"{{{{ module.{name}.alt }}}}\">{{% endif %}}"
        ),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldType;
    use crate::tree;

    fn spec_with(fields: Vec<Field>) -> ModuleSpec {
        let mut spec = ModuleSpec::new_default();
        spec.module.slug = "hero".into();
        for f in &fields {
            let slot = LayoutNode::slot(format!("slot-{}", f.name), None, Some(f.id.clone()));
            spec.layout = tree::insert_child(&spec.layout, "content", slot);
        }
        spec.fields = fields;
        spec
    }

    #[test]
    fn test_fields_json_exact_shape() {
        let mut text = Field::new(FieldType::Text, "headline", "Headline");
        text.kind = FieldKind::Text { default_value: None, max_length: Some(10) };
        let mut flag = Field::new(FieldType::Boolean, "show_cta", "Show CTA");
        flag.required = true;
        let image = Field::new(FieldType::Image, "hero", "Hero");

        let files = generate(&spec_with(vec![text, flag, image])).unwrap();
        let expected = r#"[
  {
    "name": "headline",
    "label": "Headline",
    "type": "text",
    "required": false,
    "default": ""
  },
  {
    "name": "show_cta",
    "label": "Show CTA",
    "type": "boolean",
    "required": true,
    "default": false
  },
  {
    "name": "hero",
    "label": "Hero",
    "type": "image",
    "required": false
  }
]
"#;
        assert_eq!(files["hero.module/fields.json"], expected);
    }

    #[test]
    fn test_file_set() {
        let files = generate(&spec_with(vec![Field::new(FieldType::Text, "a", "A")])).unwrap();
        let paths: Vec<_> = files.keys().cloned().collect();
        assert_eq!(
            paths,
            vec!["hero.module/fields.json", "hero.module/meta.json", "hero.module/module.html"]
        );
    }

    #[test]
    fn test_meta_lists_content_types() {
        let files = generate(&spec_with(vec![Field::new(FieldType::Text, "a", "A")])).unwrap();
        let meta: Value = serde_json::from_str(&files["hero.module/meta.json"]).unwrap();
        assert_eq!(meta["label"], "New Module");
        assert_eq!(meta["content_types"], serde_json::json!(["SITE_PAGE", "LANDING_PAGE"]));
    }

    #[test]
    fn test_template_reflects_bindings() {
        let text = Field::new(FieldType::Text, "headline", "Headline");
        let image = Field::new(FieldType::Image, "hero", "Hero");
        let html = render_template(&spec_with(vec![text, image]));
        assert!(html.contains("{{ module.headline }}"));
        assert!(html.contains("{{ module.hero.src }}"));
        assert!(html.contains("data-node=\"slot-headline\""));
        let headline = html.find("module.headline").unwrap();
        let hero = html.find("module.hero").unwrap();
        assert!(headline < hero);
    }

    #[test]
    fn test_titles_are_escaped() {
        let mut spec = spec_with(vec![Field::new(FieldType::Text, "a", "A")]);
        spec.layout = tree::map_tree(&spec.layout, &mut |n| match n {
            LayoutNode::Stack(c) => {
                let mut c = c.clone();
                c.title = Some("<b>\"x\"</b>".into());
                LayoutNode::Stack(c)
            }
            other => other.clone(),
        });
        let html = render_template(&spec);
        assert!(html.contains("data-title=\"&lt;b&gt;&quot;x&quot;&lt;/b&gt;\""));
    }

    #[test]
    fn test_contained_paths() {
        assert!(is_contained_path("hero.module/fields.json"));
        assert!(is_contained_path("./hero.module/module.html"));
        assert!(!is_contained_path("../hero.module/fields.json"));
        assert!(!is_contained_path("a/../../b"));
        assert!(!is_contained_path("/etc/hero.module/fields.json"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let spec = spec_with(vec![
            Field::new(FieldType::Text, "a", "A"),
            Field::new(FieldType::Boolean, "b", "B"),
        ]);
        assert_eq!(generate(&spec).unwrap(), generate(&spec).unwrap());
    }
}
