//! Template sub-language.
//!
//! Hypernote text embeds Mustache-style `{{ expr }}` expressions. This module
//! holds everything that understands them: the reference path grammar, the
//! interpolation engine and its filters, and the placeholder mask that shields
//! expressions from the generic Markdown parser.

pub mod filters;
pub mod interpolate;
mod mask;
pub mod reference;

use once_cell::sync::Lazy;
use regex::Regex;

pub use mask::{mask_templates, mask_value_templates, Restore, TemplateMask};

static TEMPLATE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("template regex is valid"));

/// Returns the trimmed body of every `{{ ... }}` expression in `text`.
pub fn template_expressions(text: &str) -> Vec<&str> {
    TEMPLATE_BODY
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .collect()
}

/// Byte ranges of every `{{ ... }}` span in `text`.
pub fn template_spans(text: &str) -> Vec<std::ops::Range<usize>> {
    TEMPLATE_BODY.find_iter(text).map(|m| m.range()).collect()
}

/// Reference expressions named by the fallback alternatives of every template
/// in `text`, in order of appearance.
///
/// ```
/// use hypernote::template::template_references;
/// let refs = template_references("{{ queries.feed[0].content | trim || user.pubkey || 'x' }}");
/// assert_eq!(refs, vec!["queries.feed[0].content", "user.pubkey"]);
/// ```
pub fn template_references(text: &str) -> Vec<String> {
    template_expressions(text)
        .into_iter()
        .flat_map(interpolate::split_fallbacks)
        .filter_map(|alternative| {
            let head = interpolate::alternative_head(&alternative);
            let literal = matches!(head, "true" | "false");
            (!literal && reference::is_reference_expression(head)).then(|| head.to_string())
        })
        .collect()
}
