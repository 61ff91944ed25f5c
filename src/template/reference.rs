//! Reference expression parser.
//!
//! A reference is a dotted/bracketed path such as `queries.feed[0].content` or
//! `user["display-name"]`. The grammar:
//!
//! ```text
//! reference  := identifier path
//! path       := ( '.' identifier | '.' integer | '[' index ']' )*
//! identifier := [A-Za-z_][A-Za-z0-9_-]*
//! index      := integer | "quoted" | 'quoted' | bareword
//! ```
//!
//! Failure to parse is not an error: it only means the string is not a
//! reference expression, and callers treat it as a literal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Array index.
    Index(usize),
    /// Field access.
    Key(String),
}

/// A parsed reference: a namespace root plus ordered path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub root: String,
    pub segments: Vec<Segment>,
}

impl Reference {
    /// Returns the query id when the root is `queries`.
    pub fn query_id(&self) -> Option<&str> {
        if self.root != "queries" {
            return None;
        }
        match self.segments.first() {
            Some(Segment::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                Segment::Index(i) => write!(f, "[{}]", i)?,
                Segment::Key(key) if is_identifier(key) => write!(f, ".{}", key)?,
                Segment::Key(key) => write!(f, "[{:?}]", key)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses `input` as a reference expression, or returns `None` when it is not one.
///
/// ```
/// use hypernote::template::reference::{parse_reference, Segment};
/// let r = parse_reference("queries.feed[0].content").unwrap();
/// assert_eq!(r.root, "queries");
/// assert_eq!(r.segments[1], Segment::Index(0));
/// assert!(parse_reference("queries.feed[0").is_none());
/// ```
pub fn parse_reference(input: &str) -> Option<Reference> {
    let mut cursor = Cursor::new(input.trim());
    let root = cursor.identifier()?;
    let mut segments = Vec::new();

    while let Some(c) = cursor.peek() {
        match c {
            '.' => {
                cursor.bump();
                match cursor.peek()? {
                    c if c.is_ascii_digit() => segments.push(Segment::Index(cursor.integer()?)),
                    _ => segments.push(Segment::Key(cursor.identifier()?)),
                }
            }
            '[' => {
                cursor.bump();
                segments.push(cursor.index()?);
                if cursor.bump()? != ']' {
                    return None;
                }
            }
            _ => return None,
        }
    }

    Some(Reference { root, segments })
}

/// Returns just the root of a reference expression.
pub fn reference_root(input: &str) -> Option<String> {
    parse_reference(input).map(|r| r.root)
}

/// Returns the query id (first segment) of a `queries.*` reference.
pub fn reference_query_id(input: &str) -> Option<String> {
    parse_reference(input).and_then(|r| r.query_id().map(str::to_string))
}

/// Whether `input` should be evaluated as a reference rather than used literally.
pub fn is_reference_expression(input: &str) -> bool {
    parse_reference(input).is_some()
}

// ============================================================================
// SCANNER
// ============================================================================

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(is_identifier_char)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn identifier(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        Some(self.take_while(is_identifier_char))
    }

    fn integer(&mut self) -> Option<usize> {
        self.take_while(|c| c.is_ascii_digit()).parse().ok()
    }

    fn index(&mut self) -> Option<Segment> {
        match self.peek()? {
            quote @ ('"' | '\'') => {
                self.bump();
                let key = self.take_while(|c| c != quote);
                if self.bump()? != quote {
                    return None;
                }
                Some(Segment::Key(key))
            }
            c if c.is_ascii_digit() => Some(Segment::Index(self.integer()?)),
            _ => {
                let word = self.take_while(is_identifier_char);
                if word.is_empty() {
                    None
                } else {
                    Some(Segment::Key(word))
                }
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }
}
