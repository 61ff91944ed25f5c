//! Directive tokenizer and container stack machine.
//!
//! The masked body is handed to the generic Markdown parser and its top-level
//! blocks are consumed in order. Plain blocks accumulate in the current frame's
//! group; a directive fence flushes the group into a `markdown` node and then
//! appends a leaf, opens a container (push), or closes one (pop). Containers
//! left open at the end of the document are closed implicitly. A close fence
//! with nothing open is skipped without ending the current group.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{parse_document, Arena};

use crate::compiler::dependencies::markdown_refs;
use crate::compiler::directive::{
    classify_fence, each_data, parse_payload, sanitize_layout, Container, Directive, Leaf,
};
use crate::compiler::fragment::{convert_blocks, RawHtml};
use crate::compiler::normalize::normalize_fragment;
use crate::compiler::CompileOptions;
use crate::errors::{HypernoteError, Result};
use crate::syntax::markdown::flatten_text;
use crate::syntax::{LiteralData, NodeKind, Payload, UiNode};
use crate::template::{Restore, TemplateMask};

/// Call-scoped node id counter.
#[derive(Debug, Default)]
pub struct IdGen {
    next: usize,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("n{}", self.next)
    }
}

/// A stack entry: an in-progress node and its pending plain blocks.
struct Frame<'a> {
    node: UiNode,
    group: Vec<&'a AstNode<'a>>,
}

impl<'a> Frame<'a> {
    fn new(node: UiNode) -> Self {
        Self {
            node,
            group: Vec::new(),
        }
    }

    fn push_child(&mut self, child: UiNode) {
        if let Some(children) = self.node.children_mut() {
            children.push(child);
        }
    }
}

/// The document root plus the containers currently open above it.
struct Stack<'a> {
    root: Frame<'a>,
    open: Vec<Frame<'a>>,
}

impl<'a> Stack<'a> {
    fn new(root: UiNode) -> Self {
        Self {
            root: Frame::new(root),
            open: Vec::new(),
        }
    }

    /// Innermost open container, or the root when none is open.
    fn current(&mut self) -> &mut Frame<'a> {
        match self.open.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }
}

/// Everything a flush needs besides the frame itself.
struct Builder<'s> {
    lines: Vec<&'s str>,
    mask: &'s TemplateMask,
    document: &'s str,
    ids: IdGen,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Builds the UI node tree for a masked document body.
///
/// `document` is the original, unmasked source and is only used to locate
/// errors.
pub fn build_tree(
    masked_body: &str,
    mask: &TemplateMask,
    document: &str,
    options: &CompileOptions,
) -> Result<Vec<UiNode>> {
    let normalized = ensure_blank_line_before_fences(masked_body);

    let mut markdown = comrak::Options::default();
    markdown.extension.table = options.tables;
    markdown.extension.strikethrough = options.strikethrough;
    markdown.extension.tasklist = options.tasklists;

    let arena = Arena::new();
    let root = parse_document(&arena, &normalized, &markdown);

    let mut builder = Builder {
        lines: normalized.lines().collect(),
        mask,
        document,
        ids: IdGen::new(),
    };
    let root_node = UiNode::new(
        String::new(),
        NodeKind::Vstack {
            data: Payload::new(),
            children: Vec::new(),
        },
    );
    let mut stack = Stack::new(root_node);

    for block in root.children() {
        let value = block.data.borrow().value.clone();
        match value {
            NodeValue::FrontMatter(_) => {}
            NodeValue::CodeBlock(code) if code.fenced => {
                let info = mask.restore_str(&code.info);
                let directive = classify_fence(&info);
                tracing::trace!(info = %info, ?directive, "classified fence");
                builder.handle_fence(&mut stack, directive, &code.literal)?;
            }
            _ => stack.current().group.push(block),
        }
    }

    if !stack.open.is_empty() {
        tracing::warn!(open = stack.open.len(), "closing unterminated containers at end of document");
    }
    while !stack.open.is_empty() {
        builder.close_frame(&mut stack)?;
    }
    let mut root_frame = stack.root;
    builder.flush(&mut root_frame)?;

    let UiNode { kind, .. } = root_frame.node;
    match kind {
        NodeKind::Vstack { children, .. } => Ok(children),
        _ => Ok(Vec::new()),
    }
}

// ============================================================================
// STACK MACHINE
// ============================================================================

impl<'s> Builder<'s> {
    fn handle_fence<'a>(
        &mut self,
        stack: &mut Stack<'a>,
        directive: Directive,
        body: &str,
    ) -> Result<()> {
        // A close with nothing open leaves the surrounding Markdown run intact.
        if let Directive::Close(container) = &directive {
            if stack.open.is_empty() {
                tracing::debug!(tag = container.close_tag(), "close fence without open container");
                return Ok(());
            }
        }
        self.flush(stack.current())?;
        match directive {
            Directive::Leaf(leaf) => {
                let data = self.payload(body);
                let kind = match leaf {
                    Leaf::Button => NodeKind::Button { data },
                    Leaf::Input => NodeKind::Input { data },
                    Leaf::MarkdownEditor => NodeKind::MarkdownEditor { data },
                    Leaf::MarkdownViewer => NodeKind::MarkdownViewer { data },
                };
                let node = UiNode::new(self.ids.next_id(), kind);
                stack.current().push_child(node);
            }
            Directive::Open(container) => {
                let mut data = self.payload(body);
                let kind = match container {
                    Container::Each => NodeKind::Each {
                        data: each_data(data),
                        children: Vec::new(),
                    },
                    Container::Hstack => {
                        sanitize_layout(&mut data);
                        NodeKind::Hstack {
                            data,
                            children: Vec::new(),
                        }
                    }
                    Container::Vstack => {
                        sanitize_layout(&mut data);
                        NodeKind::Vstack {
                            data,
                            children: Vec::new(),
                        }
                    }
                };
                stack.open.push(Frame::new(UiNode::new(self.ids.next_id(), kind)));
            }
            Directive::Close(container) => {
                let open = stack.current().node.type_name();
                if !container.open_tag().starts_with(open) {
                    tracing::debug!(open, tag = container.close_tag(), "close fence closes a different container");
                }
                self.close_frame(stack)?;
            }
            Directive::Literal { lang, meta } => {
                let node = UiNode::new(
                    self.ids.next_id(),
                    NodeKind::LiteralCode {
                        data: LiteralData { lang, meta },
                        text: self.mask.restore_str(body),
                    },
                );
                stack.current().push_child(node);
            }
        }
        Ok(())
    }

    /// Flushes and pops the innermost frame, attaching it to its parent.
    fn close_frame(&mut self, stack: &mut Stack<'_>) -> Result<()> {
        let Some(mut frame) = stack.open.pop() else {
            return Ok(());
        };
        self.flush(&mut frame)?;
        stack.current().push_child(frame.node);
        Ok(())
    }

    fn payload(&self, body: &str) -> Payload {
        let mut payload = parse_payload(body);
        payload.restore(self.mask);
        payload
    }

    /// Turns a frame's pending plain blocks into a `markdown` node.
    fn flush(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        if frame.group.is_empty() {
            return Ok(());
        }
        let blocks = std::mem::take(&mut frame.group);

        let mut fragment = convert_blocks(&blocks).map_err(|RawHtml(html)| {
            HypernoteError::unsupported_html(&self.mask.restore_str(&html), self.document)
        })?;
        fragment.restore(self.mask);
        normalize_fragment(&mut fragment);

        let source = self.source_of(&blocks);
        if fragment.is_empty() && source.is_empty() {
            return Ok(());
        }
        let text = flatten_text(&fragment);
        let refs = markdown_refs(&fragment, &text);

        let node = UiNode::new(
            self.ids.next_id(),
            NodeKind::Markdown {
                markdown: fragment,
                text,
                refs,
                source,
            },
        );
        frame.push_child(node);
        Ok(())
    }

    /// Restored source lines spanned by `blocks`.
    fn source_of(&self, blocks: &[&AstNode<'_>]) -> String {
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return String::new();
        };
        let start = first.data.borrow().sourcepos.start.line.max(1);
        let end = last
            .data
            .borrow()
            .sourcepos
            .end
            .line
            .max(start)
            .min(self.lines.len());
        if start > end {
            return String::new();
        }
        let raw = self.lines[start - 1..end].join("\n");
        self.mask.restore_str(raw.trim_end())
    }
}

// ============================================================================
// PRE-PASS
// ============================================================================

/// Inserts a blank line before every opening fence that directly follows
/// non-blank content, so the block parser never fuses a directive with the
/// preceding paragraph.
pub fn ensure_blank_line_before_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut open: Option<(char, usize)> = None;
    let mut prev_blank = true;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        match open {
            Some((ch, len)) => {
                if is_closing_fence(content, ch, len) {
                    open = None;
                }
            }
            None => {
                if let Some(fence) = opening_fence(content) {
                    if !prev_blank {
                        out.push('\n');
                    }
                    open = Some(fence);
                }
            }
        }
        out.push_str(line);
        prev_blank = content.trim().is_empty();
    }
    out
}

fn fence_run(line: &str) -> Option<(char, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    Some((ch, len, &rest[len..]))
}

fn opening_fence(line: &str) -> Option<(char, usize)> {
    let (ch, len, info) = fence_run(line)?;
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some((ch, len))
}

fn is_closing_fence(line: &str, ch: char, len: usize) -> bool {
    matches!(fence_run(line), Some((c, n, rest)) if c == ch && n >= len && rest.trim().is_empty())
}
