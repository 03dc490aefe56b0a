//! Clap definitions for the `formwork` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

/// formwork -- evaluate reactive form schemas.
#[derive(Parser, Debug)]
#[command(
    name = "formwork",
    about = "Evaluate reactive form schemas",
    long_about = "Evaluate visibility, requirement, defaults and options of a JSON form schema, \
                  inspect its field dependencies and complete `${...}` expressions.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: ./formwork.toml when present).
    #[arg(long, global = true, env = "FORMWORK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `warn,formwork_engine=trace`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format on stderr: pretty, compact or json.
    #[arg(long, global = true)]
    pub log_format: Option<formwork_log::Format>,

    /// Register a registry variable; the value is parsed as JSON, falling
    /// back to a plain string. Repeatable.
    #[arg(long = "var", global = true, value_name = "NAME=JSON", value_parser = parse_var)]
    pub vars: Vec<(String, Value)>,

    /// Fail on unresolved names instead of falling back.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Maximum template resolution depth.
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every field (or only those affected by --changed).
    #[command(alias = "eval")]
    Evaluate(EvaluateArgs),

    /// Print the evaluation order and any dependency cycles.
    Order(SchemaArgs),

    /// List the fields that must be re-evaluated after a change.
    Affected(AffectedArgs),

    /// Complete a partially typed `${...}` expression.
    Suggest(SuggestArgs),

    /// Check the schema for structural problems.
    Validate(SchemaArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// JSON schema file.
    #[arg(long, short = 's')]
    pub schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// JSON file with the current form values (default: empty object).
    #[arg(long, short = 'v')]
    pub values: Option<PathBuf>,

    /// Comma-separated ids of changed fields.
    #[arg(long, value_delimiter = ',')]
    pub changed: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AffectedArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// Comma-separated ids of changed fields.
    #[arg(long, value_delimiter = ',', required = true)]
    pub changed: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SuggestArgs {
    /// Partial expression text, e.g. `Hello ${us`.
    pub partial: String,

    /// JSON schema file; its top-level field ids become completion names.
    #[arg(long, short = 's')]
    pub schema: Option<PathBuf>,

    /// JSON file with form values, used for property completion.
    #[arg(long, short = 'v')]
    pub values: Option<PathBuf>,

    /// Maximum number of suggestions.
    #[arg(long, default_value_t = formwork_expression::suggest::DEFAULT_SUGGESTION_LIMIT)]
    pub limit: usize,
}

/// `name=value` where `value` is JSON or a bare string.
fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty variable name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((name.to_owned(), value))
}
