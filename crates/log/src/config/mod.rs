//! Logger configuration

mod presets;

use serde::{Deserialize, Serialize};

use crate::format::Format;

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `EnvFilter` directive, e.g. `"info"` or `"warn,formwork_engine=debug"`
    pub level: String,
    pub format: Format,
    /// Colour escape codes (ignored by `json`)
    pub ansi: bool,
    /// Include the event target (module path)
    pub target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: Format::Compact,
            ansi: true,
            target: false,
        }
    }
}

impl Config {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }
}
