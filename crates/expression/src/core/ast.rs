//! Abstract Syntax Tree (AST) node types
//!
//! A fragment body is a literal, an array literal, a path reference, a
//! function call or a nested fragment, optionally followed by property and
//! index access.

use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

/// An expression node in the AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),

    /// Array literal (`[a, b]`)
    Array(Vec<Expr>),

    /// Path reference rooted at an identifier (`user.tags[0]`)
    Path {
        root: Arc<str>,
        segments: Vec<Segment>,
    },

    /// Function call (`name(args...)`)
    Call { name: Arc<str>, args: Vec<Expr> },

    /// Nested fragment (`${...}`) used as an operand
    Fragment(Box<Expr>),

    /// Property or index access on a non-path expression (`first(xs).name`)
    Access {
        object: Box<Expr>,
        segments: Vec<Segment>,
    },
}

/// One access step after a root
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name` or `["name"]`
    Key(Arc<str>),
    /// `[3]` or `[-1]`
    Index(i64),
    /// `[expr]`, resolved at evaluation time
    Computed(Box<Expr>),
}

impl Expr {
    /// Collect every path this expression reads, in source order.
    ///
    /// Function names are not references. A path stops at the first
    /// computed segment; references inside the computed index are
    /// collected separately.
    pub fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Array(items) => items.iter().for_each(|item| item.collect_references(out)),
            Self::Path { root, segments } => {
                out.push(render_path(root, segments));
                collect_segment_references(segments, out);
            }
            Self::Call { args, .. } => args.iter().for_each(|arg| arg.collect_references(out)),
            Self::Fragment(inner) => inner.collect_references(out),
            Self::Access { object, segments } => {
                object.collect_references(out);
                collect_segment_references(segments, out);
            }
        }
    }

    /// Collect every function name this expression calls.
    pub fn collect_functions(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(_) | Self::Path { .. } => {}
            Self::Array(items) => items.iter().for_each(|item| item.collect_functions(out)),
            Self::Call { name, args } => {
                out.push(name.to_string());
                args.iter().for_each(|arg| arg.collect_functions(out));
            }
            Self::Fragment(inner) => inner.collect_functions(out),
            Self::Access { object, .. } => object.collect_functions(out),
        }
    }
}

fn collect_segment_references(segments: &[Segment], out: &mut Vec<String>) {
    for segment in segments {
        if let Segment::Computed(expr) = segment {
            expr.collect_references(out);
        }
    }
}

/// Render `root` and its leading static segments as `a.b[0]`.
pub fn render_path(root: &str, segments: &[Segment]) -> String {
    let mut path = root.to_string();
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                path.push('.');
                path.push_str(key);
            }
            Segment::Index(i) => {
                let _ = write!(path, "[{i}]");
            }
            Segment::Computed(_) => break,
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_stops_at_computed_segment() {
        let segments = vec![
            Segment::Key("items".into()),
            Segment::Index(2),
            Segment::Computed(Box::new(Expr::Literal(Value::Null))),
            Segment::Key("name".into()),
        ];
        assert_eq!(render_path("form", &segments), "form.items[2]");
    }

    #[test]
    fn references_skip_function_names() {
        let expr = Expr::Call {
            name: "upper".into(),
            args: vec![Expr::Path {
                root: "user".into(),
                segments: vec![Segment::Key("name".into())],
            }],
        };
        let mut refs = Vec::new();
        expr.collect_references(&mut refs);
        assert_eq!(refs, vec!["user.name".to_string()]);

        let mut functions = Vec::new();
        expr.collect_functions(&mut functions);
        assert_eq!(functions, vec!["upper".to_string()]);
    }
}
