//! Markdown fragment tree.
//!
//! `markdown` UI nodes embed the parsed form of their Markdown run as a small
//! mdast-style tree. Node type names follow the mdast vocabulary so renderers
//! written against mdast can consume it unchanged.

use serde::{Deserialize, Serialize};

use crate::template::{Restore, TemplateMask};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MdNode {
    // Blocks
    Paragraph {
        children: Vec<MdNode>,
    },
    Heading {
        depth: u8,
        children: Vec<MdNode>,
    },
    Blockquote {
        children: Vec<MdNode>,
    },
    List {
        ordered: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<usize>,
        spread: bool,
        children: Vec<MdNode>,
    },
    ListItem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        children: Vec<MdNode>,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        value: String,
    },
    ThematicBreak,
    Table {
        children: Vec<MdNode>,
    },
    TableRow {
        children: Vec<MdNode>,
    },
    TableCell {
        children: Vec<MdNode>,
    },

    // Inlines
    Text {
        value: String,
    },
    Emphasis {
        children: Vec<MdNode>,
    },
    Strong {
        children: Vec<MdNode>,
    },
    Delete {
        children: Vec<MdNode>,
    },
    InlineCode {
        value: String,
    },
    Break,
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        children: Vec<MdNode>,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        alt: String,
    },
}

impl MdNode {
    pub fn text(value: impl Into<String>) -> Self {
        MdNode::Text {
            value: value.into(),
        }
    }

    pub fn children(&self) -> &[MdNode] {
        match self {
            MdNode::Paragraph { children }
            | MdNode::Heading { children, .. }
            | MdNode::Blockquote { children }
            | MdNode::List { children, .. }
            | MdNode::ListItem { children, .. }
            | MdNode::Table { children }
            | MdNode::TableRow { children }
            | MdNode::TableCell { children }
            | MdNode::Emphasis { children }
            | MdNode::Strong { children }
            | MdNode::Delete { children }
            | MdNode::Link { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<MdNode>> {
        match self {
            MdNode::Paragraph { children }
            | MdNode::Heading { children, .. }
            | MdNode::Blockquote { children }
            | MdNode::List { children, .. }
            | MdNode::ListItem { children, .. }
            | MdNode::Table { children }
            | MdNode::TableRow { children }
            | MdNode::TableCell { children }
            | MdNode::Emphasis { children }
            | MdNode::Strong { children }
            | MdNode::Delete { children }
            | MdNode::Link { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            MdNode::Paragraph { .. }
                | MdNode::Heading { .. }
                | MdNode::Blockquote { .. }
                | MdNode::List { .. }
                | MdNode::ListItem { .. }
                | MdNode::Code { .. }
                | MdNode::ThematicBreak
                | MdNode::Table { .. }
                | MdNode::TableRow { .. }
                | MdNode::TableCell { .. }
        )
    }

    /// Plain text of this node and its descendants.
    pub fn plain_text(&self) -> String {
        match self {
            MdNode::Text { value } | MdNode::InlineCode { value } | MdNode::Code { value, .. } => {
                value.clone()
            }
            MdNode::Image { alt, .. } => alt.clone(),
            MdNode::Break => "\n".to_string(),
            MdNode::ThematicBreak => String::new(),
            MdNode::TableRow { children } => children
                .iter()
                .map(MdNode::plain_text)
                .collect::<Vec<_>>()
                .join(" | "),
            node if node.children().iter().any(MdNode::is_block) => {
                flatten_text(node.children())
            }
            node => node.children().iter().map(MdNode::plain_text).collect(),
        }
    }
}

/// Flattens a sequence of nodes to plain text; blocks are separated by a
/// blank line, inline runs are concatenated.
pub fn flatten_text(nodes: &[MdNode]) -> String {
    if nodes.iter().any(MdNode::is_block) {
        nodes
            .iter()
            .map(MdNode::plain_text)
            .map(|text| text.trim_end_matches('\n').to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        nodes.iter().map(MdNode::plain_text).collect()
    }
}

impl Restore for MdNode {
    fn restore(&mut self, mask: &TemplateMask) {
        match self {
            MdNode::Text { value } | MdNode::InlineCode { value } => value.restore(mask),
            MdNode::Code { lang, value } => {
                lang.restore(mask);
                value.restore(mask);
            }
            MdNode::Link {
                url,
                title,
                children,
            } => {
                url.restore(mask);
                title.restore(mask);
                children.restore(mask);
            }
            MdNode::Image { url, title, alt } => {
                url.restore(mask);
                title.restore(mask);
                alt.restore(mask);
            }
            node => {
                if let Some(children) = node.children_mut() {
                    children.restore(mask);
                }
            }
        }
    }
}
