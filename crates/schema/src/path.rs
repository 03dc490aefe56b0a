//! Field paths.
//!
//! Nested ids flatten to dotted paths. Children of group-like fields become
//! `parent.child`; children of an array item template become
//! `parent[].child`. References such as `items[3].name` normalise to the
//! template path `items[].name`.

use crate::field::{FieldKind, FieldSpec};

/// Parent name used in errors about top-level fields.
pub const ROOT: &str = "(root)";

/// A field together with its flattened path.
#[derive(Debug, Clone, Copy)]
pub struct FlatField<'a> {
    pub path: &'a str,
    pub parent: Option<&'a str>,
    pub field: &'a FieldSpec,
}

/// Owned flattening result; [`FlatField`] borrows from it.
#[derive(Debug, Clone, Default)]
pub struct FlatFields<'a> {
    entries: Vec<(String, Option<usize>, &'a FieldSpec)>,
}

impl<'a> FlatFields<'a> {
    /// Depth-first, parents before children, siblings in declaration order.
    pub fn new(fields: &'a [FieldSpec]) -> Self {
        let mut flat = Self::default();
        flat.push_all(fields, None);
        flat
    }

    fn push_all(&mut self, fields: &'a [FieldSpec], parent: Option<usize>) {
        for field in fields {
            let path = match parent {
                None => field.id.clone(),
                Some(index) => {
                    let (parent_path, _, parent_field) = &self.entries[index];
                    child_path(parent_path, parent_field.kind, &field.id)
                }
            };
            self.entries.push((path, parent, field));
            let index = self.entries.len() - 1;
            self.push_all(&field.fields, Some(index));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = FlatField<'_>> {
        self.entries.iter().map(|(path, parent, field)| FlatField {
            path,
            parent: parent.map(|i| self.entries[i].0.as_str()),
            field,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up by path; indexed references are normalised first.
    pub fn get(&self, path: &str) -> Option<FlatField<'_>> {
        let path = normalize(path);
        self.iter().find(|flat| flat.path == path)
    }

    /// The field spec at `path`, borrowed from the schema rather than from
    /// this index.
    pub fn field(&self, path: &str) -> Option<&'a FieldSpec> {
        let path = normalize(path);
        self.entries
            .iter()
            .find(|(candidate, _, _)| *candidate == path)
            .map(|(_, _, field)| *field)
    }
}

/// Path of `id` nested under `parent_path`.
#[must_use]
pub fn child_path(parent_path: &str, parent_kind: FieldKind, id: &str) -> String {
    if parent_kind == FieldKind::Array {
        format!("{parent_path}[].{id}")
    } else {
        format!("{parent_path}.{id}")
    }
}

/// Map concrete indices to the item template marker and quoted bracket keys
/// to dotted keys: `items[3].name` becomes `items[].name`, `a["b"]` becomes
/// `a.b`.
#[must_use]
pub fn normalize(reference: &str) -> String {
    let mut out = String::with_capacity(reference.len());
    let mut rest = reference;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let inner = rest[open + 1..open + close].trim();
        let quoted = inner
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        if let Some(key) = quoted {
            out.push('.');
            out.push_str(key);
        } else if inner.is_empty() || inner.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
            out.push_str("[]");
        } else {
            out.push_str(&rest[open..=open + close]);
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// The path itself and each ancestor path, longest first:
/// `a.b[].c` gives `a.b[].c`, `a.b[]`, `a.b`, `a`.
#[must_use]
pub fn prefixes(path: &str) -> Vec<&str> {
    let mut out = vec![path];
    out.extend(
        path.char_indices()
            .rev()
            .filter(|(_, c)| matches!(c, '.' | '['))
            .map(|(i, _)| &path[..i])
            .filter(|p| !p.is_empty()),
    );
    out
}
