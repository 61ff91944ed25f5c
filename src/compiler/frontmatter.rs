//! Frontmatter splitting and metadata normalization.

use serde_json::Value;

use crate::errors::{HypernoteError, Result};
use crate::syntax::{HypernoteMeta, Payload};

/// Identity keys accepted at the top level and moved under `hypernote`.
const IDENTITY_KEYS: [&str; 3] = ["name", "icon", "description"];

/// Splits `---` delimited YAML frontmatter from the body.
///
/// Returns `(frontmatter, body)`; the frontmatter is `None` when the text does
/// not open with a delimiter line or the block is never closed.
pub fn split_frontmatter(source: &str) -> (Option<&str>, &str) {
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, source)
}

/// Parses frontmatter YAML into a mapping; blank frontmatter is empty.
pub fn parse_frontmatter(yaml: &str) -> Result<Payload> {
    if yaml.trim().is_empty() {
        return Ok(Payload::new());
    }
    let value: Value = serde_yaml::from_str(yaml).map_err(|e| HypernoteError::InvalidFrontmatter {
        message: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Payload::new()),
        other => Err(HypernoteError::InvalidFrontmatter {
            message: format!("expected a mapping, found {}", json_type_name(&other)),
        }),
    }
}

/// Reshapes raw frontmatter into the canonical [`HypernoteMeta`] layout.
///
/// Dependencies are left empty; the compiler fills them from the node tree.
pub fn normalize_meta(mut raw: Payload) -> HypernoteMeta {
    let mut meta = HypernoteMeta {
        hypernote: take_section(&mut raw, "hypernote"),
        queries: take_section(&mut raw, "queries"),
        actions: take_section(&mut raw, "actions"),
        components: take_section(&mut raw, "components"),
        events: take_section(&mut raw, "events"),
        ..HypernoteMeta::default()
    };
    raw.remove("dependencies");

    for key in IDENTITY_KEYS {
        if let Some(value) = raw.remove(key) {
            meta.hypernote.entry(key.to_string()).or_insert(value);
        }
    }

    for (key, value) in raw {
        let section = match key.chars().next() {
            Some('$') => &mut meta.queries,
            Some('@') => &mut meta.actions,
            Some('#') => &mut meta.components,
            _ => {
                meta.extra.insert(key, value);
                continue;
            }
        };
        section.entry(key[1..].to_string()).or_insert(value);
    }
    meta
}

fn take_section(raw: &mut Payload, key: &str) -> Payload {
    match raw.remove(key) {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Payload::new(),
        Some(other) => {
            tracing::warn!(section = key, "frontmatter section is not a mapping; ignoring it");
            raw.insert(format!("{}_invalid", key), other);
            Payload::new()
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
