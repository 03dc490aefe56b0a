//! Splitting text into static parts and `${...}` fragments
//!
//! A [`Template`] is the parsed structure of a string that may contain
//! fragments. The closing brace of a fragment is found by tracking nested
//! braces and skipping quoted strings, so `${concat('}', ${x})}` is one
//! fragment.

use crate::error::{ExpressionError, ExpressionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opening delimiter of a fragment
pub const FRAGMENT_OPEN: &str = "${";

/// A template part - either static text or a fragment to evaluate
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Static text that doesn't need evaluation
    Static(Arc<str>),
    /// A fragment to be evaluated
    Fragment {
        /// The fragment body (without `${` and `}`)
        body: Arc<str>,
        /// Position of `${` in the source
        position: Position,
        /// Byte offset of the body in the source
        body_offset: usize,
    },
}

/// Position in the source (line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    pub column: usize,
    /// Absolute byte offset (0-based)
    pub offset: usize,
}

impl Position {
    /// Compute the position of a byte offset inside `source`
    pub fn locate(source: &str, offset: usize) -> Self {
        let before = &source[..offset.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit_once('\n')
            .map_or(before, |(_, tail)| tail)
            .chars()
            .count()
            + 1;
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    source: Arc<str>,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template from a string
    pub fn parse(source: &str) -> ExpressionResult<Self> {
        let parts = split(source)?;
        Ok(Self {
            source: Arc::from(source),
            parts,
        })
    }

    /// Get the original source string
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the parsed parts
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Number of fragments in the template
    pub fn fragment_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, TemplatePart::Fragment { .. }))
            .count()
    }

    /// True if the whole source is exactly one fragment
    pub fn is_single_fragment(&self) -> bool {
        matches!(self.parts.as_slice(), [TemplatePart::Fragment { .. }])
    }

    /// Body of the single fragment, if the source is exactly one
    pub fn single_fragment(&self) -> Option<(&str, usize)> {
        match self.parts.as_slice() {
            [TemplatePart::Fragment {
                body, body_offset, ..
            }] => Some((body, *body_offset)),
            _ => None,
        }
    }
}

/// True if `text` contains a fragment opener
pub fn contains_fragment(text: &str) -> bool {
    text.contains(FRAGMENT_OPEN)
}

fn split(source: &str) -> ExpressionResult<Vec<TemplatePart>> {
    let mut parts = Vec::new();
    let mut rest_start = 0;

    while let Some(found) = source[rest_start..].find(FRAGMENT_OPEN) {
        let open = rest_start + found;
        if open > rest_start {
            parts.push(TemplatePart::Static(Arc::from(&source[rest_start..open])));
        }
        let body_offset = open + FRAGMENT_OPEN.len();
        let close = find_close(source, body_offset).ok_or_else(|| {
            ExpressionError::syntax("unclosed expression fragment, expected '}'", open)
        })?;
        parts.push(TemplatePart::Fragment {
            body: Arc::from(&source[body_offset..close]),
            position: Position::locate(source, open),
            body_offset,
        });
        rest_start = close + 1;
    }

    if rest_start < source.len() {
        parts.push(TemplatePart::Static(Arc::from(&source[rest_start..])));
    }
    Ok(parts)
}

/// Find the byte offset of the `}` closing a fragment whose body starts at `from`
fn find_close(source: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in source[from..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }
    None
}
