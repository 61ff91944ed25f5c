//! Hypernote compiler pipeline.
//!
//! Source text flows through these stages, in order:
//!
//! 1. [`frontmatter`]: split and normalize the YAML frontmatter into metadata.
//! 2. [`crate::template`] masking: shield `{{ ... }}` spans from the Markdown parser.
//! 3. [`tokenizer`]: parse the masked body and build the UI node tree with an
//!    explicit container stack, restoring templates ([`fragment`], [`normalize`]).
//! 4. [`dependencies`]: reject legacy `$` references in queries and collect
//!    the live data the document reads.

pub mod dependencies;
pub mod directive;
pub mod fragment;
pub mod frontmatter;
pub mod normalize;
pub mod tokenizer;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::syntax::{CompiledDoc, Payload};
use crate::template::mask_templates;

use self::dependencies::{check_legacy_references, collect_dependencies};
use self::frontmatter::{normalize_meta, parse_frontmatter, split_frontmatter};
use self::tokenizer::build_tree;

/// Legacy `$` placeholders still accepted inside a query's `authors` field.
pub const DEFAULT_LEGACY_AUTHOR_PLACEHOLDERS: [&str; 3] =
    ["$user.pubkey", "$target.pubkey", "$contacts"];

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// GFM tables.
    pub tables: bool,
    /// GFM `~~strikethrough~~`.
    pub strikethrough: bool,
    /// GFM `- [x]` task list items.
    pub tasklists: bool,
    /// Prefixes of `$` values tolerated in `authors` fields.
    pub legacy_author_placeholders: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            tasklists: true,
            legacy_author_placeholders: DEFAULT_LEGACY_AUTHOR_PLACEHOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Compiles a Hypernote document with default options.
pub fn compile(source: &str) -> Result<CompiledDoc> {
    compile_with(source, &CompileOptions::default())
}

/// Compiles a Hypernote document.
pub fn compile_with(source: &str, options: &CompileOptions) -> Result<CompiledDoc> {
    let (frontmatter, body) = split_frontmatter(source);
    tracing::debug!(has_frontmatter = frontmatter.is_some(), "split frontmatter");

    let raw = match frontmatter {
        Some(yaml) => parse_frontmatter(yaml)?,
        None => Payload::new(),
    };
    let mut meta = normalize_meta(raw);

    let (masked, mask) = mask_templates(body);
    tracing::debug!(templates = mask.len(), "masked template expressions");

    let ast = build_tree(&masked, &mask, source, options)?;
    tracing::debug!(nodes = ast.len(), "built node tree");

    check_legacy_references(&meta.queries, &options.legacy_author_placeholders)?;
    meta.dependencies = collect_dependencies(&ast);
    tracing::debug!(
        queries = meta.dependencies.queries.len(),
        globals = meta.dependencies.globals.len(),
        "collected dependencies"
    );

    Ok(CompiledDoc::new(meta, ast))
}
