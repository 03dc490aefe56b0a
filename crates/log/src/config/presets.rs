//! Configuration presets

use super::Config;
use crate::format::Format;

impl Config {
    /// Read `FORMWORK_LOG` (falling back to `RUST_LOG`) and `FORMWORK_LOG_FORMAT`.
    ///
    /// An unparseable format keeps the default.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = non_empty("FORMWORK_LOG").or_else(|| non_empty("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = non_empty("FORMWORK_LOG_FORMAT").and_then(|f| f.parse::<Format>().ok())
        {
            config.format = format;
        }
        if non_empty("NO_COLOR").is_some() {
            config.ansi = false;
        }
        config
    }

    /// Debug level, pretty output with targets.
    pub fn development() -> Self {
        Self {
            level: "debug".to_owned(),
            format: Format::Pretty,
            ansi: true,
            target: true,
        }
    }

    /// Info level, JSON without colour.
    pub fn production() -> Self {
        Self {
            level: "info".to_owned(),
            format: Format::Json,
            ansi: false,
            target: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_is_default() {
        assert_eq!(Config::from_vars(vars(&[])), Config::default());
    }

    #[test]
    fn formwork_log_wins_over_rust_log() {
        let config = Config::from_vars(vars(&[
            ("FORMWORK_LOG", "debug"),
            ("RUST_LOG", "trace"),
        ]));
        assert_eq!(config.level, "debug");

        let config = Config::from_vars(vars(&[("FORMWORK_LOG", " "), ("RUST_LOG", "trace")]));
        assert_eq!(config.level, "trace");
    }

    #[test]
    fn format_and_colour_from_environment() {
        let config = Config::from_vars(vars(&[
            ("FORMWORK_LOG_FORMAT", "json"),
            ("NO_COLOR", "1"),
        ]));
        assert_eq!(config.format, Format::Json);
        assert!(!config.ansi);

        let config = Config::from_vars(vars(&[("FORMWORK_LOG_FORMAT", "xml")]));
        assert_eq!(config.format, Format::Compact);
    }

    #[test]
    fn presets() {
        assert_eq!(Config::development().format, Format::Pretty);
        let production = Config::production();
        assert_eq!(production.format, Format::Json);
        assert!(!production.ansi);
    }
}
