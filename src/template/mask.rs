//! Template placeholder masking.
//!
//! The generic Markdown parser knows nothing about `{{ ... }}` expressions and
//! happily turns the underscores in `{{ user.display_name }}` into emphasis. Before
//! parsing, every template span is swapped for an opaque alphanumeric token; after
//! parsing, [`Restore`] walks every produced string and swaps the spans back.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

static TEMPLATE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("template span regex is valid"));

const TOKEN_PREFIX: &str = "HNTPL";
const TOKEN_SUFFIX: &str = "Q";

/// Token → original span map for one compile call.
#[derive(Debug, Clone)]
pub struct TemplateMask {
    prefix: String,
    spans: Vec<String>,
    pattern: Regex,
}

/// Replaces every `{{ ... }}` span in `source` with a unique token.
///
/// ```
/// use hypernote::template::mask_templates;
/// let (masked, mask) = mask_templates("Hi {{ user.display_name }}!");
/// assert!(!masked.contains("{{"));
/// assert_eq!(mask.restore_str(&masked), "Hi {{ user.display_name }}!");
/// ```
pub fn mask_templates(source: &str) -> (String, TemplateMask) {
    let mut mask = TemplateMask::with_prefix(unique_prefix(|p| source.contains(p)));
    let masked = mask.mask_str(source);
    (masked, mask)
}

/// Masks the templates inside every string of `value` in place.
///
/// Used before emitting YAML so that quoting never escapes characters inside
/// an expression.
pub fn mask_value_templates(value: &mut Value) -> TemplateMask {
    let mut mask = TemplateMask::with_prefix(unique_prefix(|p| value_contains(&*value, p)));
    mask_value(value, &mut mask);
    mask
}

// Grow the prefix until it cannot collide with anything already in the input.
fn unique_prefix(occurs: impl Fn(&str) -> bool) -> String {
    let mut prefix = TOKEN_PREFIX.to_string();
    while occurs(&prefix) {
        prefix.push('X');
    }
    prefix
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.contains(needle),
        Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k.contains(needle) || value_contains(v, needle)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn mask_value(value: &mut Value, mask: &mut TemplateMask) {
    match value {
        Value::String(s) => *s = mask.mask_str(s),
        Value::Array(items) => items.iter_mut().for_each(|v| mask_value(v, mask)),
        Value::Object(map) => map.values_mut().for_each(|v| mask_value(v, mask)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

impl TemplateMask {
    fn with_prefix(prefix: String) -> Self {
        let pattern = Regex::new(&format!(
            "{}([0-9]+){}",
            regex::escape(&prefix),
            TOKEN_SUFFIX
        ))
        .expect("mask token regex is valid");
        Self {
            prefix,
            spans: Vec::new(),
            pattern,
        }
    }

    /// Swaps every template span in `text` for a token, recording the span.
    fn mask_str(&mut self, text: &str) -> String {
        TEMPLATE_SPAN
            .replace_all(text, |caps: &Captures| {
                let token = format!("{}{}{}", self.prefix, self.spans.len(), TOKEN_SUFFIX);
                self.spans.push(caps[0].to_string());
                token
            })
            .into_owned()
    }

    /// Number of masked spans.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Replaces every mask token in `text` with its original span.
    pub fn restore_str(&self, text: &str) -> String {
        if self.spans.is_empty() || !text.contains(&self.prefix) {
            return text.to_string();
        }
        self.pattern
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.spans.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Recursive placeholder restoration over every string-valued field.
pub trait Restore {
    fn restore(&mut self, mask: &TemplateMask);
}

impl Restore for String {
    fn restore(&mut self, mask: &TemplateMask) {
        if !mask.is_empty() && self.contains(&mask.prefix) {
            *self = mask.restore_str(self);
        }
    }
}

impl<T: Restore> Restore for Option<T> {
    fn restore(&mut self, mask: &TemplateMask) {
        if let Some(inner) = self {
            inner.restore(mask);
        }
    }
}

impl<T: Restore> Restore for Vec<T> {
    fn restore(&mut self, mask: &TemplateMask) {
        for item in self {
            item.restore(mask);
        }
    }
}

impl Restore for Value {
    fn restore(&mut self, mask: &TemplateMask) {
        match self {
            Value::String(s) => s.restore(mask),
            Value::Array(items) => items.restore(mask),
            Value::Object(map) => map.restore(mask),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

impl Restore for Map<String, Value> {
    fn restore(&mut self, mask: &TemplateMask) {
        let restored = std::mem::take(self)
            .into_iter()
            .map(|(mut key, mut value)| {
                key.restore(mask);
                value.restore(mask);
                (key, value)
            })
            .collect();
        *self = restored;
    }
}
