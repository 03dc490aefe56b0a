use std::process::ExitCode;

use anyhow::Result;

use crate::cli::EvaluateArgs;
use crate::context::{Session, load_values};
use crate::output::print_json;

pub fn run(session: &Session, args: &EvaluateArgs) -> Result<ExitCode> {
    let engine = session.engine(&args.schema.schema)?;
    let values = load_values(args.values.as_deref())?;

    let state = if args.changed.is_empty() {
        engine.evaluate(&values)
    } else {
        for id in args.changed.iter().filter(|id| !engine.graph().contains(id)) {
            tracing::warn!(field = %id, "changed field is not part of the schema");
        }
        engine.on_change(&args.changed, &values)
    };

    tracing::info!(
        fields = state.fields.len(),
        valid = state.is_valid(),
        errors = state.has_errors(),
        "evaluation finished"
    );
    print_json(&state)?;
    Ok(ExitCode::SUCCESS)
}
