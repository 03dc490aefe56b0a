use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolver::ResolveOptions;

/// Default maximum resolution depth.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Engine configuration.
///
/// Every field has a default, so a partial TOML or JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth for template resolution.
    pub max_depth: usize,
    /// Propagate unresolved names instead of substituting a fallback.
    pub strict: bool,
    /// Re-resolve results that are themselves expressions.
    pub recursive: bool,
    /// Substitute for failed expressions in lenient mode; `None` keeps the
    /// original text.
    pub fallback: Option<Value>,
    /// Lifetime of cached dynamic function results.
    pub cache_ttl_secs: u64,
    /// Maximum number of cached dynamic function results.
    pub cache_capacity: u64,
    /// Maximum number of cached parsed fragments.
    pub parse_cache_capacity: u64,
    /// Default for conditions without an explicit `case_insensitive` flag.
    pub case_insensitive_strings: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict: false,
            recursive: false,
            fallback: None,
            cache_ttl_secs: 300,
            cache_capacity: 1024,
            parse_cache_capacity: formwork_expression::engine::DEFAULT_PARSE_CACHE_CAPACITY,
            case_insensitive_strings: false,
        }
    }
}

impl EngineConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Resolution options derived from this configuration.
    #[must_use]
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            strict: self.strict,
            recursive: self.recursive,
            max_depth: self.max_depth,
            fallback: self.fallback.clone(),
            globals: serde_json::Map::new(),
        }
    }
}
