use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

/// A single choice of a select or multi-select field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// The value produced when this option is selected.
    pub value: Value,

    /// Human-readable display label.
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl SelectOption {
    #[must_use]
    pub fn new(value: Value, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
            icon: None,
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Where a select field gets its options from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum OptionsConfig {
    /// Options defined inline in the schema.
    Static { options: Vec<SelectOption> },

    /// Options produced at runtime by a registered function or an endpoint.
    ///
    /// String arguments may contain `${...}` references to other fields.
    Dynamic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
        /// Named transformer applied to the raw result.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transform: Option<String>,
        /// Fields whose change should reload the options.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        refresh_on: Vec<String>,
    },

    /// Options looked up by the current value of another field.
    Dependent {
        #[serde(default)]
        depends_on: String,
        #[serde(default)]
        options: IndexMap<String, Vec<SelectOption>>,
    },
}

impl OptionsConfig {
    pub fn static_list(options: impl IntoIterator<Item = SelectOption>) -> Self {
        Self::Static {
            options: options.into_iter().collect(),
        }
    }

    pub fn function(name: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self::Dynamic {
            function: Some(name.into()),
            endpoint: None,
            args: args.into_iter().collect(),
            transform: None,
            refresh_on: Vec::new(),
        }
    }

    pub fn dependent(
        depends_on: impl Into<String>,
        options: impl IntoIterator<Item = (String, Vec<SelectOption>)>,
    ) -> Self {
        Self::Dependent {
            depends_on: depends_on.into(),
            options: options.into_iter().collect(),
        }
    }

    /// Field names this source reads directly (not via expressions).
    #[must_use]
    pub fn field_references(&self) -> Vec<&str> {
        match self {
            Self::Static { .. } => Vec::new(),
            Self::Dynamic { refresh_on, .. } => refresh_on.iter().map(String::as_str).collect(),
            Self::Dependent { depends_on, .. } => vec![depends_on.as_str()],
        }
    }

    /// Fragment-bearing strings among dynamic arguments.
    #[must_use]
    pub fn expressions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Self::Dynamic { args, .. } = self {
            for arg in args {
                crate::condition::collect_template_strings(arg, &mut out);
            }
        }
        out
    }

    pub fn validate(&self, path: &str) -> SchemaResult<()> {
        match self {
            Self::Static { .. } => Ok(()),
            Self::Dynamic {
                function, endpoint, ..
            } => match (function, endpoint) {
                (Some(_), Some(_)) => Err(SchemaError::structural(
                    path,
                    "dynamic options take either `function` or `endpoint`, not both",
                )),
                (None, None) => Err(SchemaError::structural(
                    path,
                    "dynamic options need a `function` or an `endpoint`",
                )),
                _ => Ok(()),
            },
            Self::Dependent { depends_on, .. } => {
                if depends_on.trim().is_empty() {
                    Err(SchemaError::structural(path, "dependent options need `depends_on`"))
                } else {
                    Ok(())
                }
            }
        }
    }
}
