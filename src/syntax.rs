//! Syntax module for Hypernote documents
//!
//! This module provides the compiled document model: the typed UI node tree,
//! its metadata, and (in [`markdown`]) the Markdown fragment tree embedded in
//! `markdown` nodes. Every type serializes to the JSON shape consumed by the
//! rendering and query layers.

pub mod markdown;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use markdown::MdNode;

/// Format version stamped on every compiled document.
pub const COMPILED_DOC_VERSION: &str = "1.1.0";

/// A directive payload: the YAML body of a directive fence.
pub type Payload = Map<String, Value>;

/// The output of compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDoc {
    pub version: String,
    pub meta: HypernoteMeta,
    pub ast: Vec<UiNode>,
}

impl CompiledDoc {
    pub fn new(meta: HypernoteMeta, ast: Vec<UiNode>) -> Self {
        Self {
            version: COMPILED_DOC_VERSION.to_string(),
            meta,
            ast,
        }
    }

    /// Clears every node id so two compilations can be compared structurally.
    pub fn clear_ids(&mut self) {
        for node in &mut self.ast {
            node.clear_ids();
        }
    }
}

// ============================================================================
// UI NODES
// ============================================================================

/// One node of the UI tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    /// Sequential id, unique within one compile call.
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Node variants, discriminated by `type` in the serialized form.
///
/// Only containers (`hstack`, `vstack`, `each`) have children and only
/// `markdown` nodes carry a Markdown fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Markdown {
        markdown: Vec<MdNode>,
        /// Flattened plain text of the fragment.
        text: String,
        /// Reference expressions found in the fragment, deduplicated.
        refs: Vec<String>,
        /// Canonical Markdown source of the fragment.
        source: String,
    },
    Button {
        data: Payload,
    },
    Input {
        data: Payload,
    },
    MarkdownEditor {
        data: Payload,
    },
    MarkdownViewer {
        data: Payload,
    },
    LiteralCode {
        data: LiteralData,
        text: String,
    },
    Hstack {
        data: Payload,
        children: Vec<UiNode>,
    },
    Vstack {
        data: Payload,
        children: Vec<UiNode>,
    },
    Each {
        data: EachData,
        children: Vec<UiNode>,
    },
}

/// Payload of a `literal_code` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralData {
    pub lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

/// Payload of an `each` loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EachData {
    /// Reference the loop iterates, e.g. `queries.feed`.
    pub source: String,
    /// Loop-local alias for the current element.
    #[serde(rename = "as")]
    pub alias: String,
    #[serde(flatten)]
    pub extra: Payload,
}

impl UiNode {
    pub fn new(id: String, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn children(&self) -> &[UiNode] {
        match &self.kind {
            NodeKind::Hstack { children, .. }
            | NodeKind::Vstack { children, .. }
            | NodeKind::Each { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<UiNode>> {
        match &mut self.kind {
            NodeKind::Hstack { children, .. }
            | NodeKind::Vstack { children, .. }
            | NodeKind::Each { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Node refs for `markdown` nodes, empty otherwise.
    pub fn refs(&self) -> &[String] {
        match &self.kind {
            NodeKind::Markdown { refs, .. } => refs,
            _ => &[],
        }
    }

    /// Flattened text for `markdown` and `literal_code` nodes.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Markdown { text, .. } | NodeKind::LiteralCode { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn clear_ids(&mut self) {
        self.id.clear();
        if let Some(children) = self.children_mut() {
            for child in children {
                child.clear_ids();
            }
        }
    }
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Markdown { .. } => "markdown",
            NodeKind::Button { .. } => "button",
            NodeKind::Input { .. } => "input",
            NodeKind::MarkdownEditor { .. } => "markdown_editor",
            NodeKind::MarkdownViewer { .. } => "markdown_viewer",
            NodeKind::LiteralCode { .. } => "literal_code",
            NodeKind::Hstack { .. } => "hstack",
            NodeKind::Vstack { .. } => "vstack",
            NodeKind::Each { .. } => "each",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Hstack { .. } | NodeKind::Vstack { .. } | NodeKind::Each { .. }
        )
    }
}

// ============================================================================
// METADATA
// ============================================================================

/// Canonical document metadata built from the frontmatter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypernoteMeta {
    /// Identity of the app: `name`, `icon`, `description`, ...
    #[serde(default)]
    pub hypernote: Payload,
    #[serde(default)]
    pub queries: Payload,
    #[serde(default)]
    pub actions: Payload,
    #[serde(default)]
    pub components: Payload,
    #[serde(default)]
    pub events: Payload,
    /// Live data the document reads; always recomputed by the compiler.
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Every other frontmatter key, passed through.
    #[serde(flatten)]
    pub extra: Payload,
}

/// Deduplicated, first-seen-ordered dependency sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Query ids (`feed` for `queries.feed[0]`).
    pub queries: Vec<String>,
    /// Non-query roots (`user`, `time`, `state`).
    pub globals: Vec<String>,
}

impl Dependencies {
    pub fn add_query(&mut self, id: &str) {
        push_unique(&mut self.queries, id);
    }

    pub fn add_global(&mut self, root: &str) {
        push_unique(&mut self.globals, root);
    }
}

pub(crate) fn push_unique(set: &mut Vec<String>, item: &str) {
    if !set.iter().any(|existing| existing == item) {
        set.push(item.to_string());
    }
}
