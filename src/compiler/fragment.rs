//! Conversion of generic Markdown parser output into [`MdNode`] fragments.
//!
//! The block parser hands back an arena tree; a run of plain top-level blocks
//! is converted here into the crate's own fragment tree. Soft breaks become
//! `"\n"` inside text and adjacent text nodes are merged. Raw HTML, block or
//! inline, aborts the conversion.

use comrak::nodes::{AstNode, ListType, NodeValue};

use crate::syntax::MdNode;

/// Raw HTML found while converting; the caller turns it into an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHtml(pub String);

/// Converts top-level blocks into fragment nodes.
pub fn convert_blocks<'a>(blocks: &[&'a AstNode<'a>]) -> Result<Vec<MdNode>, RawHtml> {
    let mut out = Vec::new();
    for block in blocks {
        convert_into(block, &mut out)?;
    }
    Ok(merge_text(out))
}

fn convert_children<'a>(node: &'a AstNode<'a>) -> Result<Vec<MdNode>, RawHtml> {
    let mut out = Vec::new();
    for child in node.children() {
        convert_into(child, &mut out)?;
    }
    Ok(merge_text(out))
}

fn convert_into<'a>(node: &'a AstNode<'a>, out: &mut Vec<MdNode>) -> Result<(), RawHtml> {
    let value = node.data.borrow().value.clone();
    let converted = match value {
        NodeValue::HtmlBlock(html) => return Err(RawHtml(html.literal)),
        NodeValue::HtmlInline(html) => return Err(RawHtml(html)),

        NodeValue::Paragraph => MdNode::Paragraph {
            children: convert_children(node)?,
        },
        NodeValue::Heading(heading) => MdNode::Heading {
            depth: heading.level,
            children: convert_children(node)?,
        },
        NodeValue::BlockQuote => MdNode::Blockquote {
            children: convert_children(node)?,
        },
        NodeValue::List(list) => MdNode::List {
            ordered: list.list_type == ListType::Ordered,
            start: (list.list_type == ListType::Ordered).then_some(list.start),
            spread: !list.tight,
            children: convert_children(node)?,
        },
        NodeValue::Item(_) => MdNode::ListItem {
            checked: None,
            children: convert_children(node)?,
        },
        NodeValue::TaskItem(mark) => MdNode::ListItem {
            checked: Some(mark.is_some()),
            children: convert_children(node)?,
        },
        NodeValue::CodeBlock(code) => {
            let info = code.info.trim();
            MdNode::Code {
                lang: info
                    .split_whitespace()
                    .next()
                    .map(str::to_string),
                value: code.literal,
            }
        }
        NodeValue::ThematicBreak => MdNode::ThematicBreak,
        NodeValue::Table(_) => MdNode::Table {
            children: convert_children(node)?,
        },
        NodeValue::TableRow(_) => MdNode::TableRow {
            children: convert_children(node)?,
        },
        NodeValue::TableCell => MdNode::TableCell {
            children: convert_children(node)?,
        },

        NodeValue::Text(text) => MdNode::text(text),
        NodeValue::SoftBreak => MdNode::text("\n"),
        NodeValue::LineBreak => MdNode::Break,
        NodeValue::Code(code) => MdNode::InlineCode {
            value: code.literal,
        },
        NodeValue::Emph => MdNode::Emphasis {
            children: convert_children(node)?,
        },
        NodeValue::Strong => MdNode::Strong {
            children: convert_children(node)?,
        },
        NodeValue::Strikethrough => MdNode::Delete {
            children: convert_children(node)?,
        },
        NodeValue::Link(link) => MdNode::Link {
            url: link.url,
            title: non_empty(link.title),
            children: convert_children(node)?,
        },
        NodeValue::Image(link) => MdNode::Image {
            url: link.url,
            title: non_empty(link.title),
            alt: crate::syntax::markdown::flatten_text(&convert_children(node)?),
        },

        NodeValue::FrontMatter(_) => return Ok(()),
        // Anything else (footnotes, description lists, ...) contributes its content.
        _ => {
            for child in node.children() {
                convert_into(child, out)?;
            }
            return Ok(());
        }
    };
    out.push(converted);
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Merges adjacent text nodes and drops empty ones.
pub fn merge_text(nodes: Vec<MdNode>) -> Vec<MdNode> {
    let mut out: Vec<MdNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let MdNode::Text { value } = &node {
            if value.is_empty() {
                continue;
            }
            if let Some(MdNode::Text { value: prev }) = out.last_mut() {
                prev.push_str(value);
                continue;
            }
        }
        out.push(node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use comrak::{parse_document, Arena, Options};

    fn convert(markdown: &str) -> Result<Vec<MdNode>, RawHtml> {
        let arena = Arena::new();
        let mut options = Options::default();
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.tasklist = true;
        let root = parse_document(&arena, markdown, &options);
        let blocks: Vec<_> = root.children().collect();
        convert_blocks(&blocks)
    }

    #[test]
    fn converts_inline_structure() {
        let nodes = convert("Hello *world* and `code`\nnext ~~gone~~").unwrap();
        assert_eq!(
            nodes,
            vec![MdNode::Paragraph {
                children: vec![
                    MdNode::text("Hello "),
                    MdNode::Emphasis { children: vec![MdNode::text("world")] },
                    MdNode::text(" and "),
                    MdNode::InlineCode { value: "code".into() },
                    MdNode::text("\nnext "),
                    MdNode::Delete { children: vec![MdNode::text("gone")] },
                ]
            }]
        );
    }

    #[test]
    fn converts_images_links_and_headings() {
        let nodes = convert("## Title\n\n[site](https://x.y \"T\") ![alt *text*](a.png)").unwrap();
        assert_eq!(nodes[0], MdNode::Heading { depth: 2, children: vec![MdNode::text("Title")] });
        let MdNode::Paragraph { children } = &nodes[1] else {
            panic!("expected paragraph, got {:?}", nodes[1]);
        };
        assert_eq!(
            children[0],
            MdNode::Link {
                url: "https://x.y".into(),
                title: Some("T".into()),
                children: vec![MdNode::text("site")],
            }
        );
        assert_eq!(
            children[2],
            MdNode::Image { url: "a.png".into(), title: None, alt: "alt text".into() }
        );
    }

    #[test]
    fn task_lists_carry_checked_state() {
        let nodes = convert("- [x] done\n- [ ] todo\n").unwrap();
        let MdNode::List { children, ordered: false, .. } = &nodes[0] else {
            panic!("expected bullet list");
        };
        assert!(matches!(children[0], MdNode::ListItem { checked: Some(true), .. }));
        assert!(matches!(children[1], MdNode::ListItem { checked: Some(false), .. }));
    }

    #[test]
    fn html_is_reported() {
        assert_eq!(convert("<div>html</div>\n"), Err(RawHtml("<div>html</div>\n".into())));
        assert!(matches!(convert("a <b>bold</b> c"), Err(RawHtml(tag)) if tag == "<b>"));
    }
}
