//! Layered configuration: defaults, then `formwork.toml` (or `--config`),
//! then `FORMWORK_*` environment variables, then command-line flags.
//!
//! ```toml
//! [engine]
//! strict = true
//! cache_ttl_secs = 60
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Environment keys use `__` between table and key:
//! `FORMWORK_ENGINE__MAX_DEPTH=4`, `FORMWORK_LOG__FORMAT=json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use formwork_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::cli::GlobalArgs;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "formwork.toml";

const ENV_PREFIX: &str = "FORMWORK_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub log: formwork_log::Config,
}

impl Settings {
    /// Resolve every layer for the given flags.
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let file = match &global.config {
            Some(path) if !path.is_file() => bail!("config file {} not found", path.display()),
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut settings = Self::figment(file.as_deref())
            .extract::<Self>()
            .context("invalid configuration")?;
        settings.apply_flags(global);
        Ok(settings)
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        // Only nested keys: FORMWORK_CONFIG and friends are flags, not settings.
        figment.merge(
            Env::prefixed(ENV_PREFIX)
                .filter(|key| key.as_str().contains("__"))
                .split("__"),
        )
    }

    fn apply_flags(&mut self, global: &GlobalArgs) {
        if let Some(level) = &global.log_level {
            self.log.level.clone_from(level);
        }
        if let Some(format) = global.log_format {
            self.log.format = format;
        }
        if global.strict {
            self.engine.strict = true;
        }
        if let Some(depth) = global.max_depth {
            self.engine.max_depth = depth;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use formwork_log::Format;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_| {
            let settings: Settings = Settings::figment(None).extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_flags() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                    [engine]
                    strict = false
                    max_depth = 4
                    cache_ttl_secs = 60

                    [log]
                    format = "json"
                "#,
            )?;
            jail.set_env("FORMWORK_ENGINE__MAX_DEPTH", "6");
            jail.set_env("FORMWORK_LOG__LEVEL", "debug");

            let mut settings: Settings = Settings::figment(Some(Path::new("custom.toml"))).extract()?;
            assert_eq!(settings.engine.max_depth, 6);
            assert_eq!(settings.engine.cache_ttl_secs, 60);
            assert_eq!(settings.log.level, "debug");
            assert_eq!(settings.log.format, Format::Json);

            settings.apply_flags(&GlobalArgs {
                strict: true,
                max_depth: Some(2),
                log_format: Some(Format::Compact),
                ..GlobalArgs::default()
            });
            assert!(settings.engine.strict);
            assert_eq!(settings.engine.max_depth, 2);
            assert_eq!(settings.log.format, Format::Compact);
            Ok(())
        });
    }

    #[test]
    fn unnested_env_keys_are_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("FORMWORK_CONFIG", "elsewhere.toml");
            jail.set_env("FORMWORK_LOG", "trace");
            let settings: Settings = Settings::figment(None).extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }
}
