//! # formwork-log
//!
//! Subscriber setup for Formwork binaries.
//!
//! The libraries only emit `tracing` events; whichever binary embeds them
//! calls [`init`] once at startup to decide where those events go.
//!
//! ```no_run
//! use formwork_log::{Config, Format};
//!
//! let _guard = formwork_log::init(&Config::default().with_format(Format::Json))?;
//! tracing::info!(fields = 3, "schema loaded");
//! # Ok::<(), formwork_log::LogError>(())
//! ```

#![forbid(unsafe_code)]

mod builder;
mod config;
mod error;
mod format;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::Config;
pub use error::{LogError, LogResult};
pub use format::Format;

/// Install the global subscriber described by `config`.
///
/// A non-empty `RUST_LOG` replaces `config.level`. Fails when the filter does
/// not parse or a subscriber is already installed.
pub fn init(config: &Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config.clone()).build()
}

/// [`init`] with [`Config::from_env`].
pub fn init_from_env() -> LogResult<LoggerGuard> {
    init(&Config::from_env())
}
