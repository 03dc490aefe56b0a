//! Autocomplete for partially typed expressions
//!
//! The completion target is the identifier path at the end of the last
//! unclosed `${` fragment. A target without a dot completes variable and
//! function names; `user.na` completes the keys of whatever `user`
//! resolves to.

use crate::context::EvaluationContext;
use crate::template::FRAGMENT_OPEN;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Default number of suggestions returned
pub const DEFAULT_SUGGESTION_LIMIT: usize = 20;

/// What a suggestion completes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// A variable or form value
    Variable,
    /// A key of an object value
    Property,
    /// A registered function
    Function,
}

/// A ranked completion candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Full path or name being suggested (`user.name`, `upper`)
    pub label: String,
    /// Text that replaces the partial identifier
    pub insert_text: String,
    pub kind: SuggestionKind,
    /// Signature, description or value type
    pub detail: Option<String>,
    pub score: i32,
}

/// Suggest completions for `partial` against the names visible in `context`
pub fn suggest(partial: &str, context: &EvaluationContext, limit: usize) -> Vec<Suggestion> {
    let Some(target) = completion_target(partial) else {
        return Vec::new();
    };

    let mut suggestions = match target.rsplit_once('.') {
        Some((object_path, prefix)) => property_suggestions(object_path, prefix, context),
        None => name_suggestions(target, context),
    };

    suggestions.sort_by(rank);
    suggestions.truncate(limit);
    tracing::trace!(target = target, count = suggestions.len(), "computed suggestions");
    suggestions
}

/// The identifier path being typed at the end of the last unclosed fragment
pub fn completion_target(partial: &str) -> Option<&str> {
    let open = last_unclosed_fragment(partial)?;
    let body = &partial[open + FRAGMENT_OPEN.len()..];
    let start = body
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'))
        .last()
        .map_or(body.len(), |(i, _)| i);
    Some(&body[start..])
}

fn last_unclosed_fragment(text: &str) -> Option<usize> {
    let mut open: Vec<usize> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '$' if chars.peek().is_some_and(|(_, c)| *c == '{') => {
                chars.next();
                open.push(i);
            }
            '\'' | '"' if !open.is_empty() => quote = Some(ch),
            '}' => {
                open.pop();
            }
            _ => {}
        }
    }
    open.pop()
}

fn name_suggestions(prefix: &str, context: &EvaluationContext) -> Vec<Suggestion> {
    let mut out = Vec::new();

    for name in context.visible_names() {
        let Some(score) = fuzzy_score(prefix, &name) else {
            continue;
        };
        let detail = context
            .registry()
            .variables()
            .into_iter()
            .find(|v| v.name == name)
            .and_then(|v| v.description)
            .or_else(|| {
                context
                    .resolve_name(&name)
                    .map(|v| crate::value_utils::value_type_name(&v).to_string())
            });
        out.push(Suggestion {
            insert_text: name.clone(),
            label: name,
            kind: SuggestionKind::Variable,
            detail,
            score,
        });
    }

    for function in context.registry().functions() {
        let Some(score) = fuzzy_score(prefix, &function.name) else {
            continue;
        };
        let signature = format!("{}({})", function.name, function.params.join(", "));
        let detail = match function.description {
            Some(description) => format!("{signature}: {description}"),
            None => signature,
        };
        out.push(Suggestion {
            insert_text: format!("{}(", function.name),
            label: function.name,
            kind: SuggestionKind::Function,
            detail: Some(detail),
            score,
        });
    }
    out
}

fn property_suggestions(object_path: &str, prefix: &str, context: &EvaluationContext) -> Vec<Suggestion> {
    let Some(Value::Object(map)) = context.lookup_path(object_path) else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            fuzzy_score(prefix, key).map(|score| Suggestion {
                label: format!("{object_path}.{key}"),
                insert_text: key.clone(),
                kind: SuggestionKind::Property,
                detail: Some(crate::value_utils::value_type_name(value).to_string()),
                score,
            })
        })
        .collect()
}

/// Higher score first, then variables before functions, then shorter, then
/// alphabetical
fn rank(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.label.len().cmp(&b.label.len()))
        .then_with(|| a.label.cmp(&b.label))
}

/// Case-insensitive subsequence score; `None` when `query` is not a
/// subsequence of `target`
pub fn fuzzy_score(query: &str, target: &str) -> Option<i32> {
    if query.is_empty() {
        return Some(0);
    }

    let target: Vec<char> = target.chars().flat_map(char::to_lowercase).collect();
    let mut query_chars = query.chars().flat_map(char::to_lowercase).peekable();
    let mut score = 0i32;
    let mut last_match_idx: Option<usize> = None;
    let mut consecutive_bonus = 0i32;

    for (idx, &target_char) in target.iter().enumerate() {
        let Some(&query_char) = query_chars.peek() else {
            break;
        };
        if query_char != target_char {
            continue;
        }
        query_chars.next();
        score += 10;

        if let Some(last) = last_match_idx {
            if idx == last + 1 {
                consecutive_bonus += 5;
                score += consecutive_bonus;
            } else {
                consecutive_bonus = 0;
            }
        }

        if idx == 0 {
            score += 15;
        } else if matches!(target[idx - 1], '_' | '-' | '.' | ' ') {
            score += 10;
        }

        last_match_idx = Some(idx);
    }

    if query_chars.peek().is_some() {
        None
    } else {
        Some(score)
    }
}
