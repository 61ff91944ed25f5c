//! Fragment normalization passes.
//!
//! Two repairs run over every flushed Markdown fragment, bottom-up:
//!
//! - **Image merge**: `![alt](url)` shorthand whose target holds a template
//!   expression can survive parsing as literal text. Such text is fused back
//!   into an `image` node.
//! - **Template re-merge**: a `{{ ... }}` expression must never straddle two
//!   sibling inline nodes. When one does (e.g. an emphasis node opened by an
//!   underscore inside the expression), the whole inline run is flattened and
//!   re-split on template boundaries into plain `text` nodes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::MdNode;
use crate::template::template_spans;

static TEMPLATED_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]\n]*)\]\(\s*([^)\s]*\{\{.*?\}\}[^)\s]*)\s*\)")
        .expect("templated image regex is valid")
});

/// Normalizes a fragment in place.
pub fn normalize_fragment(nodes: &mut Vec<MdNode>) {
    for node in nodes.iter_mut() {
        if let Some(children) = node.children_mut() {
            normalize_fragment(children);
        }
    }
    let taken = std::mem::take(nodes);
    *nodes = remerge_templates(merge_images(taken));
}

// ============================================================================
// IMAGE MERGE
// ============================================================================

fn merge_images(nodes: Vec<MdNode>) -> Vec<MdNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MdNode::Text { value } if TEMPLATED_IMAGE.is_match(&value) => {
                split_images(&value, &mut out);
            }
            other => out.push(other),
        }
    }
    out
}

fn split_images(text: &str, out: &mut Vec<MdNode>) {
    let mut last = 0;
    for caps in TEMPLATED_IMAGE.captures_iter(text) {
        let (Some(whole), Some(alt), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > last {
            out.push(MdNode::text(&text[last..whole.start()]));
        }
        out.push(MdNode::Image {
            url: url.as_str().to_string(),
            title: None,
            alt: alt.as_str().to_string(),
        });
        last = whole.end();
    }
    if last < text.len() {
        out.push(MdNode::text(&text[last..]));
    }
}

// ============================================================================
// TEMPLATE RE-MERGE
// ============================================================================

fn is_mergeable(node: &MdNode) -> bool {
    matches!(
        node,
        MdNode::Text { .. } | MdNode::Emphasis { .. } | MdNode::Strong { .. } | MdNode::Delete { .. }
    )
}

fn remerge_templates(nodes: Vec<MdNode>) -> Vec<MdNode> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut run: Vec<MdNode> = Vec::new();
    for node in nodes {
        if is_mergeable(&node) {
            run.push(node);
            continue;
        }
        flush_run(&mut run, &mut out);
        out.push(node);
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<MdNode>, out: &mut Vec<MdNode>) {
    let run = std::mem::take(run);
    if run.is_empty() {
        return;
    }
    let texts: Vec<String> = run.iter().map(MdNode::plain_text).collect();
    let joined = texts.concat();

    let mut boundaries = Vec::with_capacity(texts.len());
    let mut offset = 0;
    for text in &texts[..texts.len() - 1] {
        offset += text.len();
        boundaries.push(offset);
    }

    let spans = template_spans(&joined);
    let crosses = spans
        .iter()
        .any(|span| boundaries.iter().any(|b| span.start < *b && *b < span.end));
    let dangling = run.iter().any(|node| match node {
        MdNode::Text { .. } => false,
        other => {
            let text = other.plain_text();
            text.contains("{{") != text.contains("}}")
        }
    });

    if !crosses && !dangling {
        out.extend(run);
        return;
    }

    tracing::trace!(nodes = run.len(), "re-merging template split across inline nodes");
    let mut last = 0;
    for span in spans {
        if span.start > last {
            out.push(MdNode::text(&joined[last..span.start]));
        }
        out.push(MdNode::text(&joined[span.clone()]));
        last = span.end;
    }
    if last < joined.len() {
        out.push(MdNode::text(&joined[last..]));
    }
}
