//! Directive fence classification and payload handling.
//!
//! A fenced code block whose info string names a UI construct is a directive.
//! Language tags are case-insensitive and `.`/space are interchangeable, so
//! `HStack Start`, `hstack.start` and `hstack  start` all open a row.

use serde_json::Value;

use crate::syntax::{EachData, Payload};

/// Source used by an `each` loop that names none.
pub const DEFAULT_EACH_SOURCE: &str = "queries.items";
/// Alias used by an `each` loop that names none.
pub const DEFAULT_EACH_ALIAS: &str = "item";

const LAYOUT_FIELDS: [&str; 2] = ["width", "height"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Hstack,
    Vstack,
    Each,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    Button,
    Input,
    MarkdownEditor,
    MarkdownViewer,
}

/// What a fenced block means to the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Leaf(Leaf),
    Open(Container),
    Close(Container),
    /// Not a directive: an opaque code sample.
    Literal { lang: String, meta: Option<String> },
}

impl Container {
    /// Canonical info string of the opening fence.
    pub fn open_tag(self) -> &'static str {
        match self {
            Container::Hstack => "hstack.start",
            Container::Vstack => "vstack.start",
            Container::Each => "each.start",
        }
    }

    /// Canonical info string of the closing fence.
    pub fn close_tag(self) -> &'static str {
        match self {
            Container::Hstack => "hstack.end",
            Container::Vstack => "vstack.end",
            Container::Each => "each.end",
        }
    }
}

impl Leaf {
    /// Canonical info string of the fence.
    pub fn tag(self) -> &'static str {
        match self {
            Leaf::Button => "button",
            Leaf::Input => "input",
            Leaf::MarkdownEditor => "markdown-editor",
            Leaf::MarkdownViewer => "markdown.viewer",
        }
    }
}

/// Classifies a fence by its info string.
pub fn classify_fence(info: &str) -> Directive {
    let normalized = info
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase();

    match normalized.as_str() {
        "button" => Directive::Leaf(Leaf::Button),
        "input" => Directive::Leaf(Leaf::Input),
        "markdown-editor" | "markdown_editor" | "markdown.editor" => {
            Directive::Leaf(Leaf::MarkdownEditor)
        }
        "markdown.viewer" | "markdown-viewer" | "markdown_viewer" => {
            Directive::Leaf(Leaf::MarkdownViewer)
        }
        "hstack.start" => Directive::Open(Container::Hstack),
        "vstack.start" => Directive::Open(Container::Vstack),
        "each" | "each.start" => Directive::Open(Container::Each),
        "hstack.end" => Directive::Close(Container::Hstack),
        "vstack.end" => Directive::Close(Container::Vstack),
        "each.end" => Directive::Close(Container::Each),
        _ => {
            let info = info.trim();
            let (lang, meta) = match info.split_once(char::is_whitespace) {
                Some((lang, meta)) => (lang, Some(meta.trim().to_string())),
                None => (info, None),
            };
            Directive::Literal {
                lang: lang.to_string(),
                meta: meta.filter(|m| !m.is_empty()),
            }
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Parses a directive body into a payload.
///
/// YAML mappings are used as-is. Anything else falls back to line-based
/// `key: value` extraction, and when that finds nothing the raw body becomes
/// `{ text: <body> }`. A blank body is an empty payload.
pub fn parse_payload(body: &str) -> Payload {
    if body.trim().is_empty() {
        return Payload::new();
    }
    match serde_yaml::from_str::<Value>(body) {
        Ok(Value::Object(map)) => return map,
        Ok(_) => tracing::warn!("directive payload is not a mapping; using line fallback"),
        Err(e) => tracing::warn!(error = %e, "directive payload is not valid YAML; using line fallback"),
    }

    let fallback = parse_payload_lines(body);
    if !fallback.is_empty() {
        return fallback;
    }
    let mut payload = Payload::new();
    payload.insert("text".into(), Value::String(body.trim().to_string()));
    payload
}

fn parse_payload_lines(body: &str) -> Payload {
    let mut payload = Payload::new();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }
        payload.insert(key.to_string(), Value::String(strip_quotes(value.trim()).to_string()));
    }
    payload
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Normalizes container layout fields to explicit pixel units.
pub fn sanitize_layout(payload: &mut Payload) {
    for field in LAYOUT_FIELDS {
        let Some(value) = payload.get_mut(field) else {
            continue;
        };
        let normalized = match &*value {
            Value::Number(n) => format!("{}px", n),
            Value::String(s) => {
                let s = s.trim();
                if is_plain_number(s) {
                    format!("{}px", s)
                } else {
                    s.to_string()
                }
            }
            _ => continue,
        };
        *value = Value::String(normalized);
    }
}

fn is_plain_number(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
        && s.matches('.').count() <= 1
}

/// Builds `each` loop data from its payload.
pub fn each_data(mut payload: Payload) -> EachData {
    let from = payload.remove("from");
    let source = payload.remove("source");
    let source = from
        .or(source)
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_EACH_SOURCE)
        .to_string();

    let alias = payload
        .remove("as")
        .as_ref()
        .and_then(Value::as_str)
        .map(|s| s.trim().trim_start_matches('$').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_EACH_ALIAS.to_string());

    sanitize_layout(&mut payload);
    EachData {
        source,
        alias,
        extra: payload,
    }
}
