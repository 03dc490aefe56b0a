//! Dynamic function service with TTL caching and option post-processing.
//!
//! Calls go through the shared [`Registry`]. Results are cached per
//! function name, resolved arguments and transformer, so callers may see a
//! result up to one TTL old.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use formwork_expression::value_utils::{
    get_path, parse_plain_path, to_display_string, value_type_name, values_equal,
};
use formwork_expression::{ExpressionEngine, Registry};
use formwork_schema::SelectOption;
use moka::sync::Cache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{ResolveOptions, TemplateResolver};

/// Post-processing step applied to a raw function result.
pub type Transformer = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// A named function invocation whose arguments may reference form values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCall {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl DynamicCall {
    pub fn new(function: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            function: function.into(),
            args: args.into_iter().collect(),
            transform: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }
}

/// Cache performance counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Share of lookups served from cache, `0.0` before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Executes registered functions on behalf of dynamic option sources.
pub struct DynamicFunctionService {
    registry: Arc<Registry>,
    resolver: TemplateResolver,
    cache: Cache<String, Value>,
    transformers: RwLock<HashMap<String, Transformer>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for DynamicFunctionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFunctionService")
            .field("transformers", &self.transformers.read().keys().collect::<Vec<_>>())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl DynamicFunctionService {
    pub fn new(registry: Arc<Registry>, expressions: Arc<ExpressionEngine>) -> Self {
        Self::with_cache(registry, expressions, Duration::from_secs(300), 1024)
    }

    pub fn from_config(
        registry: Arc<Registry>,
        expressions: Arc<ExpressionEngine>,
        config: &EngineConfig,
    ) -> Self {
        Self::with_cache(registry, expressions, config.cache_ttl(), config.cache_capacity)
    }

    pub fn with_cache(
        registry: Arc<Registry>,
        expressions: Arc<ExpressionEngine>,
        ttl: Duration,
        capacity: u64,
    ) -> Self {
        let service = Self {
            resolver: TemplateResolver::new(expressions, Arc::clone(&registry)),
            registry,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            transformers: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        service.register_transformer("to_options", |value| {
            serde_json::to_value(to_options(&value)).map_err(|err| err.to_string())
        });
        service
    }

    /// Register a named transformer, replacing any previous one.
    pub fn register_transformer<F>(&self, name: impl Into<String>, transform: F)
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(transformer = %name, "registering transformer");
        self.transformers.write().insert(name, Arc::new(transform));
    }

    #[must_use]
    pub fn has_transformer(&self, name: &str) -> bool {
        self.transformers.read().contains_key(name)
    }

    /// Run `call` with its arguments resolved against `form_state`.
    ///
    /// A cached result younger than the TTL is returned without invoking the
    /// function. Concurrent misses on the same key invoke it once.
    pub fn execute(&self, call: &DynamicCall, form_state: &Value) -> EngineResult<Value> {
        let args = self.resolve_args(call, form_state)?;
        let key = cache_key(call, &args);

        let mut invoked = false;
        let result = self.cache.try_get_with(key.clone(), || {
            invoked = true;
            self.invoke(call, &args)
        });

        match result {
            Ok(value) => {
                if invoked {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(function = %call.function, key = %key, "dynamic function cache miss");
                } else {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(function = %call.function, key = %key, "dynamic function cache hit");
                }
                Ok(value)
            }
            Err(err) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err((*err).clone())
            }
        }
    }

    /// Run `call` and page through the resulting list.
    pub fn execute_query(
        &self,
        call: &DynamicCall,
        form_state: &Value,
        query: &OptionsQuery,
    ) -> EngineResult<Page> {
        match self.execute(call, form_state)? {
            Value::Array(items) => Ok(query.apply(items)),
            other => Err(EngineError::function(
                &call.function,
                format!("expected a list, found {}", value_type_name(&other)),
            )),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        tracing::debug!("dynamic function cache cleared");
    }

    fn resolve_args(&self, call: &DynamicCall, form_state: &Value) -> EngineResult<Vec<Value>> {
        let options = ResolveOptions::strict();
        let ctx = self.resolver.context(form_state, None, &options);
        call.args
            .iter()
            .map(|arg| self.resolver.resolve_in(arg, &ctx, &options))
            .collect()
    }

    fn invoke(&self, call: &DynamicCall, args: &[Value]) -> EngineResult<Value> {
        tracing::trace!(function = %call.function, "invoking dynamic function");
        let raw = self.registry.call(&call.function, args)?;
        let Some(name) = &call.transform else {
            return Ok(raw);
        };
        let transform = self
            .transformers
            .read()
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| EngineError::unknown_transformer(name))?;
        transform(raw).map_err(|message| EngineError::function(&call.function, message))
    }
}

fn cache_key(call: &DynamicCall, args: &[Value]) -> String {
    format!(
        "{}|{}|{}",
        call.function,
        Value::Array(args.to_vec()),
        call.transform.as_deref().unwrap_or_default()
    )
}

/// Interpret a function result as select options.
///
/// Objects contribute their `value`, `label` and `icon` keys; scalars become
/// options labelled with their display form. Anything else yields nothing.
#[must_use]
pub fn to_options(value: &Value) -> Vec<SelectOption> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(entry) => {
                let value = entry.get("value")?.clone();
                let label = entry
                    .get("label")
                    .map_or_else(|| to_display_string(&value), to_display_string);
                let option = SelectOption::new(value, label);
                Some(match entry.get("icon").and_then(Value::as_str) {
                    Some(icon) => option.with_icon(icon),
                    None => option,
                })
            }
            Value::Null => None,
            scalar => Some(SelectOption::new(scalar.clone(), to_display_string(scalar))),
        })
        .collect()
}

/// Search, filter, sort and pagination over option-like items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsQuery {
    /// Case-insensitive substring matched against value and label.
    pub search: Option<String>,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// Item field is one of `values`.
    In { field: String, values: Vec<Value> },
    /// Item field equals `value`.
    Equals { field: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub by: SortBy,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Value,
    Label,
    /// Dotted path into the item.
    Field(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    /// Matches before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
    pub has_more: bool,
}

impl OptionsQuery {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn sorted(mut self, by: SortBy, direction: SortDirection) -> Self {
        self.sort = Some(Sort { by, direction });
        self
    }

    #[must_use]
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Filter, then sort, then slice. An offset past the end gives an empty
    /// page.
    #[must_use]
    pub fn apply(&self, items: Vec<Value>) -> Page {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<Value> = items
            .into_iter()
            .filter(|item| needle.as_deref().is_none_or(|n| matches_search(item, n)))
            .filter(|item| self.filters.iter().all(|filter| filter.accepts(item)))
            .collect();

        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                let ordering = sort_key(a, &sort.by).cmp(&sort_key(b, &sort.by));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let total = matched.len();
        let items: Vec<Value> = matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        Page {
            has_more: self.offset.saturating_add(items.len()) < total,
            items,
            total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

impl Filter {
    fn accepts(&self, item: &Value) -> bool {
        match self {
            Self::In { field, values } => field_value(item, field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
            Self::Equals { field, value } => {
                field_value(item, field).is_some_and(|v| values_equal(v, value))
            }
        }
    }
}

fn field_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_plain_path(path)?;
    get_path(item, &segments)
}

fn matches_search(item: &Value, needle: &str) -> bool {
    let haystacks = match item {
        Value::Object(_) => vec![
            item.get("value").map(to_display_string),
            item.get("label").map(to_display_string),
        ],
        scalar => vec![Some(to_display_string(scalar))],
    };
    haystacks
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(needle))
}

fn sort_key(item: &Value, by: &SortBy) -> String {
    let value = match by {
        SortBy::Value if item.is_object() => item.get("value"),
        SortBy::Value => Some(item),
        SortBy::Label => item.get("label"),
        SortBy::Field(path) => field_value(item, path),
    };
    value.map(to_display_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_service(ttl: Duration) -> (DynamicFunctionService, Arc<AtomicUsize>) {
        let registry = Arc::new(Registry::with_builtins());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register_function("cities", move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let country = args.first().map(to_display_string).unwrap_or_default();
            Ok(match country.as_str() {
                "NO" => json!([{"value": "osl", "label": "Oslo"}, {"value": "brg", "label": "Bergen"}]),
                _ => json!([]),
            })
        });
        registry.register_function("broken", |_| {
            Err(formwork_expression::ExpressionError::function("broken", "backend down"))
        });
        let service = DynamicFunctionService::with_cache(
            registry,
            Arc::new(ExpressionEngine::new()),
            ttl,
            64,
        );
        (service, calls)
    }

    #[test]
    fn identical_calls_within_ttl_hit_the_cache() {
        let (service, calls) = counting_service(Duration::from_secs(60));
        let call = DynamicCall::new("cities", [json!("${country}")]);
        let state = json!({"country": "NO"});

        let first = service.execute(&call, &state).unwrap();
        let second = service.execute(&call, &state).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });

        service.execute(&call, &json!({"country": "SE"})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        service.invalidate_all();
        service.execute(&call, &state).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let (service, calls) = counting_service(Duration::from_millis(20));
        let call = DynamicCall::new("cities", [json!("NO")]);
        service.execute(&call, &json!({})).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        service.execute(&call, &json!({})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transformers_shape_results() {
        let (service, _) = counting_service(Duration::from_secs(60));
        let call = DynamicCall::new("cities", [json!("NO")]).with_transform("to_options");
        let out = service.execute(&call, &json!({})).unwrap();
        assert_eq!(out[1], json!({"value": "brg", "label": "Bergen"}));

        service.register_transformer("count", |v| {
            v.as_array().map(|a| json!(a.len())).ok_or_else(|| "not a list".to_string())
        });
        let counted = service
            .execute(&DynamicCall::new("cities", [json!("NO")]).with_transform("count"), &json!({}))
            .unwrap();
        assert_eq!(counted, json!(2));

        let err = service
            .execute(&DynamicCall::new("cities", [json!("SE")]).with_transform("nope"), &json!({}))
            .unwrap_err();
        assert_eq!(err.code(), "ENGINE:UNKNOWN_TRANSFORMER");
    }

    #[test]
    fn failures_surface_and_are_not_cached() {
        let (service, _) = counting_service(Duration::from_secs(60));
        let err = service
            .execute(&DynamicCall::new("broken", []), &json!({}))
            .unwrap_err();
        assert_eq!(err.category(), formwork_expression::ErrorCategory::Function);
        assert_eq!(service.stats().entries, 0);

        let err = service
            .execute(&DynamicCall::new("cities", [json!("${missing}")]), &json!({}))
            .unwrap_err();
        assert_eq!(err.category(), formwork_expression::ErrorCategory::Resolution);
    }

    fn fruit() -> Vec<Value> {
        vec![
            json!({"value": "apple", "label": "Apple", "meta": {"color": "red", "kcal": 52}}),
            json!({"value": "banana", "label": "Banana", "meta": {"color": "yellow", "kcal": 89}}),
            json!({"value": "cherry", "label": "Cherry", "meta": {"color": "red", "kcal": 50}}),
            json!({"value": "lemon", "label": "Lemon", "meta": {"color": "yellow", "kcal": 29}}),
        ]
    }

    fn values(page: &Page) -> Vec<&str> {
        page.items.iter().filter_map(|i| i["value"].as_str()).collect()
    }

    #[rstest]
    #[case::search(OptionsQuery::search("AN"), vec!["banana"])]
    #[case::search_label(OptionsQuery::search("err"), vec!["cherry"])]
    #[case::filter_in(
        OptionsQuery::default().with_filter(Filter::In { field: "meta.color".into(), values: vec![json!("red")] }),
        vec!["apple", "cherry"]
    )]
    #[case::filter_equals(
        OptionsQuery::default().with_filter(Filter::Equals { field: "meta.kcal".into(), value: json!(89.0) }),
        vec!["banana"]
    )]
    #[case::sort_desc(
        OptionsQuery::default().sorted(SortBy::Label, SortDirection::Desc),
        vec!["lemon", "cherry", "banana", "apple"]
    )]
    #[case::sort_field(
        OptionsQuery::default().sorted(SortBy::Field("meta.color".into()), SortDirection::Asc),
        vec!["apple", "cherry", "banana", "lemon"]
    )]
    #[case::page(OptionsQuery::default().page(1, 2), vec!["banana", "cherry"])]
    #[case::past_end(OptionsQuery::default().page(10, 2), vec![])]
    fn query_pipeline(#[case] query: OptionsQuery, #[case] expected: Vec<&str>) {
        assert_eq!(values(&query.apply(fruit())), expected);
    }

    #[test]
    fn page_reports_totals() {
        let page = OptionsQuery::default().page(0, 3).apply(fruit());
        assert_eq!((page.total, page.has_more), (4, true));
        let page = OptionsQuery::default().page(3, 3).apply(fruit());
        assert_eq!((page.total, page.has_more, page.items.len()), (4, false, 1));
    }

    #[test]
    fn queries_deserialize_from_json() {
        let query: OptionsQuery = serde_json::from_value(json!({
            "search": "e",
            "filters": [{"kind": "in", "field": "meta.color", "values": ["yellow"]}],
            "sort": {"by": {"field": "meta.kcal"}},
            "limit": 5
        }))
        .unwrap();
        assert_eq!(values(&query.apply(fruit())), vec!["lemon"]);
    }

    #[test]
    fn scalars_become_options() {
        let options = to_options(&json!(["a", 2, null, {"value": true, "icon": "check"}]));
        assert_eq!(
            options,
            vec![
                SelectOption::new(json!("a"), "a"),
                SelectOption::new(json!(2), "2"),
                SelectOption::new(json!(true), "true").with_icon("check"),
            ]
        );
    }
}
