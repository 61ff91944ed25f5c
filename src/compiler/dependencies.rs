//! Dependency extraction and the legacy reference guard.
//!
//! Dependencies tell the query layer which live data a document reads:
//! `dependencies.queries` holds query ids, `dependencies.globals` holds the
//! other namespace roots (`user`, `time`, `state`). Loop aliases introduced by
//! `each` are local to the loop body and never become globals.

use serde_json::Value;

use crate::errors::{HypernoteError, Result};
use crate::syntax::{push_unique, Dependencies, MdNode, NodeKind, Payload, UiNode};
use crate::template::reference::{parse_reference, Segment};
use crate::template::template_references;

// ============================================================================
// NODE REFS
// ============================================================================

/// References named by a Markdown fragment: its flattened text plus every
/// link and image target, deduplicated in order of appearance.
pub fn markdown_refs(fragment: &[MdNode], text: &str) -> Vec<String> {
    let mut refs = Vec::new();
    for r in template_references(text) {
        push_unique(&mut refs, &r);
    }
    collect_url_refs(fragment, &mut refs);
    refs
}

fn collect_url_refs(nodes: &[MdNode], refs: &mut Vec<String>) {
    for node in nodes {
        if let MdNode::Link { url, .. } | MdNode::Image { url, .. } = node {
            for r in template_references(url) {
                push_unique(refs, &r);
            }
        }
        collect_url_refs(node.children(), refs);
    }
}

/// References inside every string of a directive payload.
pub fn payload_refs(payload: &Payload) -> Vec<String> {
    let mut refs = Vec::new();
    for value in payload.values() {
        collect_value_refs(value, &mut refs);
    }
    refs
}

fn collect_value_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for r in template_references(s) {
                push_unique(refs, &r);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_value_refs(v, refs)),
        Value::Object(map) => map.values().for_each(|v| collect_value_refs(v, refs)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

// ============================================================================
// DOCUMENT DEPENDENCIES
// ============================================================================

/// Union of the dependencies of every node in the tree.
pub fn collect_dependencies(ast: &[UiNode]) -> Dependencies {
    let mut deps = Dependencies::default();
    let mut aliases = Vec::new();
    walk_nodes(ast, &mut aliases, &mut deps);
    deps
}

fn walk_nodes(nodes: &[UiNode], aliases: &mut Vec<String>, deps: &mut Dependencies) {
    for node in nodes {
        match &node.kind {
            NodeKind::Markdown { refs, .. } => {
                refs.iter().for_each(|r| record(r, aliases, deps));
            }
            NodeKind::Button { data }
            | NodeKind::Input { data }
            | NodeKind::MarkdownEditor { data }
            | NodeKind::MarkdownViewer { data } => {
                payload_refs(data).iter().for_each(|r| record(r, aliases, deps));
            }
            NodeKind::LiteralCode { .. } => {}
            NodeKind::Hstack { data, children } | NodeKind::Vstack { data, children } => {
                payload_refs(data).iter().for_each(|r| record(r, aliases, deps));
                walk_nodes(children, aliases, deps);
            }
            NodeKind::Each { data, children } => {
                record(&data.source, aliases, deps);
                payload_refs(&data.extra).iter().for_each(|r| record(r, aliases, deps));
                aliases.push(data.alias.clone());
                walk_nodes(children, aliases, deps);
                aliases.pop();
            }
        }
    }
}

fn record(expression: &str, aliases: &[String], deps: &mut Dependencies) {
    let Some(reference) = parse_reference(expression) else {
        return;
    };
    match reference.root.as_str() {
        "queries" => {
            if let Some(id) = reference.query_id() {
                deps.add_query(id);
            }
        }
        "globals" => {
            if let Some(Segment::Key(key)) = reference.segments.first() {
                deps.add_global(key);
            }
        }
        root if aliases.iter().any(|alias| alias == root) => {}
        root => deps.add_global(root),
    }
}

// ============================================================================
// LEGACY GUARD
// ============================================================================

/// Rejects deprecated `$` references anywhere in the `queries` metadata.
///
/// A `$` value is tolerated only as a loop-local `$item.` reference inside a
/// `from`/`with` field, or as one of the `allowed_authors` placeholders inside
/// an `authors` field.
pub fn check_legacy_references(queries: &Payload, allowed_authors: &[String]) -> Result<()> {
    for (name, value) in queries {
        check_value(value, &format!("queries.{}", name), None, allowed_authors)?;
    }
    Ok(())
}

fn check_value(value: &Value, path: &str, field: Option<&str>, allowed_authors: &[String]) -> Result<()> {
    match value {
        Value::String(s) if s.starts_with('$') => {
            let allowed = match field {
                Some("from") | Some("with") => s.starts_with("$item."),
                Some("authors") => allowed_authors
                    .iter()
                    .any(|prefix| s.starts_with(prefix.as_str())),
                _ => false,
            };
            if allowed {
                Ok(())
            } else {
                Err(HypernoteError::legacy_reference(path, s))
            }
        }
        Value::Array(items) => items.iter().enumerate().try_for_each(|(i, item)| {
            check_value(item, &format!("{}[{}]", path, i), field, allowed_authors)
        }),
        Value::Object(map) => map.iter().try_for_each(|(key, item)| {
            // Mappings nested under from/with/authors stay under that field.
            let inner = match field {
                Some(f @ ("from" | "with" | "authors")) => f,
                _ => key.as_str(),
            };
            check_value(item, &format!("{}.{}", path, key), Some(inner), allowed_authors)
        }),
        _ => Ok(()),
    }
}
