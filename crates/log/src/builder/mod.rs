//! Logger builder

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::{LogError, LogResult};
use crate::format::Format;

/// Shared fmt layer settings; events always go to stderr so stdout stays
/// free for command output.
macro_rules! fmt_layer {
    ($config:expr) => {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi($config.ansi)
            .with_target($config.target)
    };
}

/// Builds and installs the global subscriber.
#[derive(Debug, Clone)]
pub struct LoggerBuilder {
    config: Config,
}

/// Returned by a successful install. Describes what is active.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the guard reports the active logger configuration"]
pub struct LoggerGuard {
    filter: String,
    format: Format,
}

impl LoggerGuard {
    /// The directive actually in force.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl LoggerBuilder {
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter and install the subscriber.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let directive = effective_directive(&self.config.level, std::env::var("RUST_LOG").ok());
        let filter = parse_filter(&directive)?;
        let registry = Registry::default().with(filter);

        let installed = match self.config.format {
            Format::Pretty => registry.with(fmt_layer!(self.config).pretty()).try_init(),
            Format::Compact => registry.with(fmt_layer!(self.config).compact()).try_init(),
            Format::Json => registry
                .with(fmt_layer!(self.config).json().with_current_span(true))
                .try_init(),
        };
        installed.map_err(|err| LogError::Init(err.to_string()))?;

        tracing::debug!(filter = %directive, format = %self.config.format, "logger initialised");
        Ok(LoggerGuard {
            filter: directive,
            format: self.config.format,
        })
    }
}

/// `RUST_LOG`, when set and non-empty, replaces the configured level.
fn effective_directive(level: &str, env: Option<String>) -> String {
    env.filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.to_owned())
}

fn parse_filter(directive: &str) -> LogResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|err| LogError::filter(directive, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info", None, "info")]
    #[case("info", Some("debug"), "debug")]
    #[case("warn", Some("  "), "warn")]
    #[case("info", Some("formwork_engine=trace"), "formwork_engine=trace")]
    fn rust_log_overrides_level(
        #[case] level: &str,
        #[case] env: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(effective_directive(level, env.map(str::to_owned)), expected);
    }

    #[rstest]
    #[case("info")]
    #[case("warn,formwork_engine=debug")]
    #[case("off")]
    fn accepts_directives(#[case] directive: &str) {
        assert!(parse_filter(directive).is_ok());
    }

    #[test]
    fn rejects_bad_level() {
        let err = parse_filter("formwork=loudest").unwrap_err();
        assert_eq!(err.code(), "LOG:FILTER");
        assert!(err.to_string().contains("formwork=loudest"));
    }
}
