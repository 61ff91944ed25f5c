//! Shared helpers for Hypernote integration tests.
#![allow(dead_code)]

use difference::{Changeset, Difference};
use hypernote::syntax::MdNode;
use hypernote::{compile, CompiledDoc, NodeKind, UiNode};

/// Compiles `source`, panicking with the rendered diagnostic on failure.
pub fn compile_ok(source: &str) -> CompiledDoc {
    match compile(source) {
        Ok(doc) => doc,
        Err(err) => panic!("compile failed: {:?}", miette::Report::new(err)),
    }
}

/// Compiles `source` and clears node ids for structural comparison.
pub fn compile_structural(source: &str) -> CompiledDoc {
    let mut doc = compile_ok(source);
    doc.clear_ids();
    doc
}

/// The Markdown fragment of a `markdown` node.
pub fn fragment(node: &UiNode) -> &[MdNode] {
    match &node.kind {
        NodeKind::Markdown { markdown, .. } => markdown,
        other => panic!("expected markdown node, got {}", other.type_name()),
    }
}

/// Every node of the tree, depth-first.
pub fn all_nodes(nodes: &[UiNode]) -> Vec<&UiNode> {
    let mut out = Vec::new();
    for node in nodes {
        out.push(node);
        out.extend(all_nodes(node.children()));
    }
    out
}

/// Counts fragment nodes matching `pred`, recursively.
pub fn count_md(nodes: &[MdNode], pred: &dyn Fn(&MdNode) -> bool) -> usize {
    nodes
        .iter()
        .map(|n| usize::from(pred(n)) + count_md(n.children(), pred))
        .sum()
}

/// Line diff of two texts, `+`/`-` prefixed, for failure messages.
pub fn line_diff(expected: &str, actual: &str) -> String {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut out = String::new();
    for diff in &changeset.diffs {
        let (prefix, text) = match diff {
            Difference::Same(x) => (" ", x),
            Difference::Add(x) => ("+", x),
            Difference::Rem(x) => ("-", x),
        };
        for line in text.lines() {
            out.push_str(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
