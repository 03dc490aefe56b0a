use std::process::ExitCode;

use anyhow::Result;
use formwork_expression::{EvaluationContext, suggest};
use serde_json::{Map, Value};

use crate::cli::SuggestArgs;
use crate::context::{Session, load_schema, load_values};
use crate::output::print_json;

pub fn run(session: &Session, args: &SuggestArgs) -> Result<ExitCode> {
    let mut data = match load_values(args.values.as_deref())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    // Field ids complete even before the form has values.
    if let Some(path) = &args.schema {
        for field in load_schema(path)?.fields {
            data.entry(field.id).or_insert(Value::Null);
        }
    }

    let context = EvaluationContext::builder(session.registry.clone())
        .data(Value::Object(data))
        .build();
    let suggestions = suggest(&args.partial, &context, args.limit);
    tracing::debug!(count = suggestions.len(), "suggestions computed");
    print_json(&suggestions)?;
    Ok(ExitCode::SUCCESS)
}
