//! Mustache-style interpolation engine.
//!
//! Renders `{{ expr }}` occurrences against a two-namespace [`Scope`]. An
//! expression is a list of `||` fallback alternatives; each alternative is a
//! head (reference or literal) followed by `| filter:arg` stages. The first
//! alternative that renders to a non-empty string wins, and an expression with
//! no such alternative renders as the empty string.
//!
//! `\{{` and `\}}` render as literal braces.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::template::filters::FilterRegistry;
use crate::template::reference::{parse_reference, Reference, Segment};

static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("expression regex is valid"));

const ESCAPED_OPEN: &str = "\u{E000}\u{E000}";
const ESCAPED_CLOSE: &str = "\u{E001}\u{E001}";

/// Data an expression resolves against.
///
/// `queries.*` resolves in `queries`, `globals.*` in `globals`, and any other
/// root (`user`, `time`, `state`, a loop alias) is looked up as a key of
/// `globals`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub globals: Map<String, Value>,
    pub queries: Map<String, Value>,
}

impl Scope {
    pub fn new(globals: Map<String, Value>, queries: Map<String, Value>) -> Self {
        Self { globals, queries }
    }

    /// Resolves a parsed reference; `None` when any step is missing.
    pub fn resolve(&self, reference: &Reference) -> Option<&Value> {
        let mut current = match reference.root.as_str() {
            "queries" => return self.walk_map(&self.queries, &reference.segments),
            "globals" => return self.walk_map(&self.globals, &reference.segments),
            root => self.globals.get(root)?,
        };
        for segment in &reference.segments {
            current = step(current, segment)?;
        }
        Some(current)
    }

    fn walk_map<'a>(&self, map: &'a Map<String, Value>, segments: &[Segment]) -> Option<&'a Value> {
        let (first, rest) = segments.split_first()?;
        let mut current = match first {
            Segment::Key(key) => map.get(key)?,
            Segment::Index(i) => map.get(&i.to_string())?,
        };
        for segment in rest {
            current = step(current, segment)?;
        }
        Some(current)
    }
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        (Value::Array(items), Segment::Key(key)) => items.get(key.parse::<usize>().ok()?),
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        _ => None,
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Renders every `{{ expr }}` in `template` against `scope`.
///
/// ```
/// use hypernote::template::interpolate::{interpolate, Scope};
/// use hypernote::template::filters::build_default_filter_registry;
/// use serde_json::json;
///
/// let mut scope = Scope::default();
/// scope.globals.insert("user".into(), json!({ "name": "ada" }));
/// let filters = build_default_filter_registry();
/// assert_eq!(
///     interpolate("Hi {{ user.name | uppercase }}{{ user.missing || '!' }}", &scope, &filters),
///     "Hi ADA!"
/// );
/// ```
pub fn interpolate(template: &str, scope: &Scope, filters: &FilterRegistry) -> String {
    let shielded = template
        .replace(r"\{{", ESCAPED_OPEN)
        .replace(r"\}}", ESCAPED_CLOSE);
    let rendered = EXPRESSION.replace_all(&shielded, |caps: &Captures| {
        evaluate_expression(&caps[1], scope, filters).unwrap_or_default()
    });
    rendered
        .replace(ESCAPED_OPEN, "{{")
        .replace(ESCAPED_CLOSE, "}}")
}

/// Evaluates one expression body (the text between the braces).
pub fn evaluate_expression(expr: &str, scope: &Scope, filters: &FilterRegistry) -> Option<String> {
    split_fallbacks(expr).into_iter().find_map(|alternative| {
        evaluate_alternative(&alternative, scope, filters)
            .and_then(|value| render_value(&value))
            .filter(|s| !s.is_empty())
    })
}

/// Evaluates `head | filter:arg | ...` to a value.
pub fn evaluate_alternative(alternative: &str, scope: &Scope, filters: &FilterRegistry) -> Option<Value> {
    let mut stages = split_unquoted(alternative, '|').into_iter();
    let head = stages.next()?;
    let mut value = resolve_head(head.trim(), scope)?;
    for stage in stages {
        let (name, arg) = match stage.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(unquote(arg.trim()))),
            None => (stage.trim(), None),
        };
        value = filters.apply(name, &value, arg);
    }
    Some(value)
}

fn resolve_head(head: &str, scope: &Scope) -> Option<Value> {
    if let Some(reference) = parse_reference(head) {
        return match head {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => scope.resolve(&reference).cloned(),
        };
    }
    parse_literal(head)
}

/// Parses a quoted string, integer, or decimal literal.
fn parse_literal(head: &str) -> Option<Value> {
    let bytes = head.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Some(Value::String(head[1..head.len() - 1].to_string()));
        }
    }
    if let Ok(i) = head.parse::<i64>() {
        return Some(Value::from(i));
    }
    head.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::from)
}

/// Renders a resolved value as text; `None` for null.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

// ============================================================================
// SPLITTING
// ============================================================================

/// Splits an expression on unquoted, unescaped `||`.
pub fn split_fallbacks(expr: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', _) => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ('"' | '\'', None) => {
                quote = Some(c);
                current.push(c);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(c);
            }
            ('|', None) if chars.peek() == Some(&'|') => {
                chars.next();
                parts.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Splits on `sep` outside of quotes.
fn split_unquoted(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == sep => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Returns the head of an alternative, i.e. the text before its first filter.
pub fn alternative_head(alternative: &str) -> &str {
    split_unquoted(alternative, '|')
        .into_iter()
        .next()
        .unwrap_or_default()
        .trim()
}

fn unquote(arg: &str) -> &str {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[0] == bytes[bytes.len() - 1] {
        &arg[1..arg.len() - 1]
    } else {
        arg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::filters::build_default_filter_registry;
    use serde_json::json;

    fn scope() -> Scope {
        let globals = json!({
            "user": { "pubkey": "npub1abc", "name": "  ada  " },
            "time": { "now": 1_700_000_000 },
            "item": { "content": "hello" }
        });
        let queries = json!({
            "feed": [ { "content": "first", "created_at": 1_700_000_000 }, { "content": "" } ],
            "stats": { "count": 3 }
        });
        Scope::new(
            globals.as_object().cloned().unwrap(),
            queries.as_object().cloned().unwrap(),
        )
    }

    fn render(template: &str) -> String {
        interpolate(template, &scope(), &build_default_filter_registry())
    }

    #[test]
    fn resolves_both_namespaces() {
        assert_eq!(render("{{ queries.feed[0].content }}/{{ user.pubkey }}"), "first/npub1abc");
        assert_eq!(render("{{ queries.stats.count }}"), "3");
        assert_eq!(render("{{ globals.item.content }}"), "hello");
    }

    #[test]
    fn falls_back_past_missing_and_empty_values() {
        assert_eq!(render("{{ queries.feed[1].content || user.pubkey }}"), "npub1abc");
        assert_eq!(render("{{ queries.nope || 'default' }}"), "default");
        assert_eq!(render("{{ queries.nope || user.nope }}"), "");
    }

    #[test]
    fn literals_and_booleans() {
        assert_eq!(render("{{ 42 }}|{{ 1.5 }}|{{ true }}|{{ \"a || b\" }}"), "42|1.5|true|a || b");
    }

    #[test]
    fn filters_apply_left_to_right() {
        assert_eq!(render("{{ user.name | trim | uppercase }}"), "ADA");
        assert_eq!(render("{{ time.now | format_date:date }}"), "2023-11-14");
        assert_eq!(render("{{ time.now | format_date:\"date\" }}"), "2023-11-14");
        assert_eq!(render("{{ user.pubkey | no_such_filter }}"), "npub1abc");
    }

    #[test]
    fn escaped_braces_render_literally() {
        assert_eq!(render(r"\{{ user.pubkey \}} is {{ user.pubkey }}"), "{{ user.pubkey }} is npub1abc");
    }

    #[test]
    fn unresolved_never_prints_null() {
        assert_eq!(render("[{{ queries.feed[9].content }}]"), "[]");
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(
            split_fallbacks("queries.a || 'x || y' || b"),
            vec!["queries.a", "'x || y'", "b"]
        );
        assert_eq!(alternative_head("queries.feed | uppercase"), "queries.feed");
        assert_eq!(alternative_head("'a|b' | trim"), "'a|b'");
    }
}
