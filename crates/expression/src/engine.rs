//! Expression engine with caching support
//!
//! [`ExpressionEngine`] parses and evaluates text containing `${...}`
//! fragments, caching parsed fragment bodies in a bounded moka cache.

use crate::context::EvaluationContext;
use crate::core::ast::Expr;
use crate::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::parser::parse_fragment;
use crate::template::{Template, TemplatePart, contains_fragment};
use crate::value_utils::to_display_string;
use moka::sync::Cache;
use serde_json::Value;
use std::sync::Arc;

/// Default number of parsed fragments kept in the cache
pub const DEFAULT_PARSE_CACHE_CAPACITY: u64 = 512;

/// What to do when evaluating a text fails
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FailureMode {
    /// Propagate the error
    #[default]
    Strict,
    /// Return the given value instead
    Fallback(Value),
    /// Return the original text unchanged
    KeepOriginal,
}

/// Expression engine with parsing and evaluation capabilities
pub struct ExpressionEngine {
    cache: Option<Cache<String, Arc<Expr>>>,
    evaluator: Evaluator,
}

impl ExpressionEngine {
    /// Create an engine with the default parse cache
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_PARSE_CACHE_CAPACITY)
    }

    /// Create an engine caching up to `size` parsed fragments
    pub fn with_cache_size(size: u64) -> Self {
        tracing::debug!(cache_size = size, "created expression engine with parse cache");
        Self {
            cache: Some(Cache::new(size)),
            evaluator: Evaluator::new(),
        }
    }

    /// Create an engine that parses every fragment on each evaluation
    pub fn without_cache() -> Self {
        Self {
            cache: None,
            evaluator: Evaluator::new(),
        }
    }

    /// Replace the evaluator (for a custom nesting limit)
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Parse a fragment body, using the cache when enabled
    pub fn parse_fragment(&self, body: &str, body_offset: usize) -> ExpressionResult<Arc<Expr>> {
        let Some(cache) = &self.cache else {
            return parse_fragment(body, body_offset).map(Arc::new);
        };
        if let Some(expr) = cache.get(body) {
            return Ok(expr);
        }
        let expr = Arc::new(parse_fragment(body, body_offset)?);
        cache.insert(body.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    /// Parse text into static parts and fragments
    pub fn parse_template(&self, text: &str) -> ExpressionResult<Template> {
        Template::parse(text)
    }

    /// Evaluate text in the given context.
    ///
    /// Text without fragments comes back unchanged as a string. Text that is
    /// exactly one fragment yields the fragment's native value. Anything
    /// else yields a string with each fragment's display form substituted.
    pub fn evaluate(&self, text: &str, context: &EvaluationContext) -> ExpressionResult<Value> {
        if !contains_fragment(text) {
            return Ok(Value::String(text.to_string()));
        }
        let template = Template::parse(text)?;
        self.evaluate_template(&template, context)
    }

    /// Evaluate a parsed template
    pub fn evaluate_template(
        &self,
        template: &Template,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value> {
        if let Some((body, offset)) = template.single_fragment() {
            return self.evaluate_fragment(body, offset, context);
        }

        let mut result = String::with_capacity(template.source().len());
        for part in template.parts() {
            match part {
                TemplatePart::Static(text) => result.push_str(text),
                TemplatePart::Fragment {
                    body, body_offset, ..
                } => {
                    let value = self.evaluate_fragment(body, *body_offset, context)?;
                    result.push_str(&to_display_string(&value));
                }
            }
        }
        Ok(Value::String(result))
    }

    /// Evaluate text, handling failure according to `mode`
    pub fn evaluate_with(
        &self,
        text: &str,
        context: &EvaluationContext,
        mode: &FailureMode,
    ) -> ExpressionResult<Value> {
        match (self.evaluate(text, context), mode) {
            (Ok(value), _) => Ok(value),
            (Err(err), FailureMode::Strict) => Err(err),
            (Err(err), FailureMode::Fallback(fallback)) => {
                tracing::warn!(expression = text, error = %err, "expression failed, using fallback");
                Ok(fallback.clone())
            }
            (Err(err), FailureMode::KeepOriginal) => {
                tracing::warn!(expression = text, error = %err, "expression failed, keeping original text");
                Ok(Value::String(text.to_string()))
            }
        }
    }

    /// Every path referenced by any fragment in `text`, deduplicated in
    /// source order. Function names are not included.
    pub fn references(&self, text: &str) -> ExpressionResult<Vec<String>> {
        let mut refs = Vec::new();
        self.visit_fragments(text, |expr| expr.collect_references(&mut refs))?;
        let mut seen = std::collections::HashSet::new();
        refs.retain(|r| seen.insert(r.clone()));
        Ok(refs)
    }

    /// Every function called by any fragment in `text`, deduplicated
    pub fn functions_called(&self, text: &str) -> ExpressionResult<Vec<String>> {
        let mut names = Vec::new();
        self.visit_fragments(text, |expr| expr.collect_functions(&mut names))?;
        let mut seen = std::collections::HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        Ok(names)
    }

    /// Check that every fragment in `text` parses
    pub fn check_syntax(&self, text: &str) -> ExpressionResult<()> {
        self.visit_fragments(text, |_| {})
    }

    /// True if `text` contains at least one `${` opener
    pub fn is_expression(text: &str) -> bool {
        contains_fragment(text)
    }

    /// Drop all cached parse results
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            tracing::debug!("expression parse cache cleared");
        }
    }

    /// Approximate number of cached parse results
    pub fn cached_entries(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| {
            cache.run_pending_tasks();
            cache.entry_count()
        })
    }

    fn evaluate_fragment(
        &self,
        body: &str,
        body_offset: usize,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value> {
        let expr = self.parse_fragment(body, body_offset)?;
        let value = self.evaluator.eval(&expr, context)?;
        tracing::trace!(fragment = body, result = ?value, "evaluated fragment");
        Ok(value)
    }

    fn visit_fragments(&self, text: &str, mut visit: impl FnMut(&Expr)) -> ExpressionResult<()> {
        if !contains_fragment(text) {
            return Ok(());
        }
        for part in Template::parse(text)?.parts() {
            if let TemplatePart::Fragment {
                body, body_offset, ..
            } = part
            {
                let expr = self.parse_fragment(body, *body_offset)?;
                visit(&expr);
            }
        }
        Ok(())
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("cached", &self.cache.is_some())
            .field("evaluator", &self.evaluator)
            .finish()
    }
}
