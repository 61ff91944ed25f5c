//! Canonical decompiler: [`CompiledDoc`] back to Markdown.
//!
//! Output is deterministic. Frontmatter keys are sorted recursively inside a
//! fixed section order, every node type has exactly one fence encoding, and
//! blocks are separated by one blank line. Compiling the output reproduces the
//! original metadata and node tree, ids aside.

use serde_json::Value;
use serde_yaml::{Mapping, Value as Yaml};

use crate::compiler::directive::{Container, Leaf};
use crate::errors::{HypernoteError, Result};
use crate::syntax::{CompiledDoc, HypernoteMeta, NodeKind, Payload, UiNode};
use crate::template::mask_value_templates;

/// Frontmatter sections emitted ahead of passthrough keys, in this order.
const SECTION_ORDER: [&str; 5] = ["hypernote", "queries", "actions", "components", "events"];

/// Renders a compiled document as canonical Hypernote Markdown.
pub fn decompile(doc: &CompiledDoc) -> Result<String> {
    let mut blocks = Vec::new();
    for node in &doc.ast {
        encode_node(node, &mut blocks)?;
    }
    let body = blocks.join("\n\n");

    let mut out = String::new();
    match frontmatter_yaml(&doc.meta)? {
        Some(yaml) => {
            out.push_str("---\n");
            out.push_str(&yaml);
            out.push_str("---\n");
        }
        // An opening `---` in the body would be read back as frontmatter.
        None if body.starts_with("---") => out.push_str("---\n---\n"),
        None => {}
    }
    if !body.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&body);
        out.push('\n');
    }
    tracing::debug!(nodes = doc.ast.len(), bytes = out.len(), "decompiled document");
    Ok(out)
}

// ============================================================================
// NODES
// ============================================================================

fn encode_node(node: &UiNode, blocks: &mut Vec<String>) -> Result<()> {
    match &node.kind {
        NodeKind::Markdown { source, text, .. } => {
            let markdown = if source.is_empty() { text } else { source };
            if !markdown.trim().is_empty() {
                blocks.push(markdown.trim_end().to_string());
            }
        }
        NodeKind::Button { data } => blocks.push(leaf_fence(Leaf::Button, data)?),
        NodeKind::Input { data } => blocks.push(leaf_fence(Leaf::Input, data)?),
        NodeKind::MarkdownEditor { data } => blocks.push(leaf_fence(Leaf::MarkdownEditor, data)?),
        NodeKind::MarkdownViewer { data } => blocks.push(leaf_fence(Leaf::MarkdownViewer, data)?),
        NodeKind::LiteralCode { data, text } => {
            let info = match &data.meta {
                Some(meta) => format!("{} {}", data.lang, meta),
                None => data.lang.clone(),
            };
            blocks.push(fence(&info, text));
        }
        NodeKind::Hstack { data, children } => {
            encode_container(Container::Hstack, data, children, blocks)?;
        }
        NodeKind::Vstack { data, children } => {
            encode_container(Container::Vstack, data, children, blocks)?;
        }
        NodeKind::Each { data, children } => {
            let mut payload = data.extra.clone();
            payload.insert("from".into(), Value::String(data.source.clone()));
            payload.insert("as".into(), Value::String(data.alias.clone()));
            encode_container(Container::Each, &payload, children, blocks)?;
        }
    }
    Ok(())
}

fn encode_container(
    container: Container,
    data: &Payload,
    children: &[UiNode],
    blocks: &mut Vec<String>,
) -> Result<()> {
    blocks.push(fence(container.open_tag(), &payload_yaml(data)?));
    for child in children {
        encode_node(child, blocks)?;
    }
    blocks.push(fence(container.close_tag(), ""));
    Ok(())
}

fn leaf_fence(leaf: Leaf, data: &Payload) -> Result<String> {
    Ok(fence(leaf.tag(), &payload_yaml(data)?))
}

/// A fence long enough that no run inside `body` can close it.
///
/// Backtick fences cannot carry a backtick in their info string, so those
/// fall back to tildes.
fn fence(info: &str, body: &str) -> String {
    let ch = if info.contains('`') { '~' } else { '`' };
    let longest = body
        .split(|c| c != ch)
        .map(str::len)
        .max()
        .unwrap_or(0);
    let marker = ch.to_string().repeat(longest.max(2) + 1);

    let mut out = format!("{}{}\n", marker, info);
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&marker);
    out
}

// ============================================================================
// YAML
// ============================================================================

/// Payload YAML with template expressions written verbatim.
///
/// Expressions are masked while the emitter picks a quoting style, so the
/// compiler's own masking sees exactly the text it would have masked.
fn payload_yaml(data: &Payload) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }
    let mut value = Value::Object(data.clone());
    let mask = mask_value_templates(&mut value);
    let Value::Object(masked) = value else {
        return Ok(String::new());
    };
    let yaml = to_yaml(&Yaml::Mapping(sorted_mapping(masked.iter())))?;
    Ok(mask.restore_str(&yaml))
}

fn frontmatter_yaml(meta: &HypernoteMeta) -> Result<Option<String>> {
    let sections = [
        &meta.hypernote,
        &meta.queries,
        &meta.actions,
        &meta.components,
        &meta.events,
    ];

    let mut mapping = Mapping::new();
    for (name, section) in SECTION_ORDER.iter().zip(sections) {
        if !section.is_empty() {
            mapping.insert(
                Yaml::String(name.to_string()),
                Yaml::Mapping(sorted_mapping(section.iter())),
            );
        }
    }
    for (key, value) in sorted_mapping(meta.extra.iter()) {
        mapping.insert(key, value);
    }

    if mapping.is_empty() {
        return Ok(None);
    }
    to_yaml(&Yaml::Mapping(mapping)).map(Some)
}

fn sorted_mapping<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> Mapping {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let mut mapping = Mapping::new();
    for (key, value) in entries {
        mapping.insert(Yaml::String(key.clone()), to_sorted_yaml(value));
    }
    mapping
}

fn to_sorted_yaml(value: &Value) -> Yaml {
    match value {
        Value::Null => Yaml::Null,
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Yaml::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Yaml::Number(u.into())
            } else {
                Yaml::Number(n.as_f64().unwrap_or_default().into())
            }
        }
        Value::String(s) => Yaml::String(s.clone()),
        Value::Array(items) => Yaml::Sequence(items.iter().map(to_sorted_yaml).collect()),
        Value::Object(map) => Yaml::Mapping(sorted_mapping(map.iter())),
    }
}

fn to_yaml(value: &Yaml) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| HypernoteError::Serialization {
        message: e.to_string(),
    })
}
