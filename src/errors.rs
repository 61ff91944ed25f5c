//! Hypernote Error Handling
//!
//! Every fatal condition of the compile and decompile pipelines is a variant of
//! [`HypernoteError`]. Errors are `miette` diagnostics: each carries a stable
//! code of the form `hypernote::<area>::<kind>` and, where it helps, a help
//! message and a labelled location in the original document.
//!
//! Non-fatal conditions (malformed directive payloads, unterminated containers)
//! never surface here; the compiler recovers from them and logs a warning.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HypernoteError>;

/// Unified error type for the Hypernote compiler and decompiler.
#[derive(Debug, Error, Diagnostic)]
pub enum HypernoteError {
    /// Raw HTML appeared somewhere in the document body.
    #[error("HTML is not supported: `{html}`")]
    #[diagnostic(
        code(hypernote::content::html),
        help("Hypernote renders a fixed node vocabulary; use Markdown or a directive fence instead of raw HTML.")
    )]
    UnsupportedHtml {
        html: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("raw HTML here")]
        span: Option<SourceSpan>,
    },

    /// A deprecated `$`-prefixed reference was found in query metadata.
    #[error("Legacy reference `{value}` at `{path}` is no longer supported; use `{suggestion}`")]
    #[diagnostic(
        code(hypernote::legacy::reference),
        help("`$name` shorthands were replaced by explicit `queries.<name>` references.")
    )]
    LegacyReference {
        path: String,
        value: String,
        suggestion: String,
    },

    /// The frontmatter block is not a YAML mapping.
    #[error("Invalid frontmatter: {message}")]
    #[diagnostic(code(hypernote::meta::frontmatter))]
    InvalidFrontmatter { message: String },

    /// The decompiler failed to emit YAML for a payload or the frontmatter.
    #[error("Serialization error: {message}")]
    #[diagnostic(code(hypernote::decompile::yaml))]
    Serialization { message: String },
}

impl HypernoteError {
    /// Builds an [`HypernoteError::UnsupportedHtml`] and locates `html` inside
    /// `document` for the diagnostic label.
    pub fn unsupported_html(html: &str, document: &str) -> Self {
        let html = html.trim().to_string();
        let span = if html.is_empty() {
            None
        } else {
            document
                .find(html.as_str())
                .map(|start| SourceSpan::from((start, html.len())))
        };
        HypernoteError::UnsupportedHtml {
            html,
            src: NamedSource::new("document", document.to_string()),
            span,
        }
    }

    /// Builds a [`HypernoteError::LegacyReference`] whose suggestion rewrites the
    /// leading `$` sigil as a `queries.` root.
    pub fn legacy_reference(path: impl Into<String>, value: &str) -> Self {
        let suggestion = format!("queries.{}", value.trim_start_matches('$'));
        HypernoteError::LegacyReference {
            path: path.into(),
            value: value.to_string(),
            suggestion,
        }
    }

    /// Returns the diagnostic code suffix, e.g. `html` or `reference`.
    pub fn code_suffix(&self) -> &'static str {
        match self {
            HypernoteError::UnsupportedHtml { .. } => "html",
            HypernoteError::LegacyReference { .. } => "reference",
            HypernoteError::InvalidFrontmatter { .. } => "frontmatter",
            HypernoteError::Serialization { .. } => "yaml",
        }
    }
}
