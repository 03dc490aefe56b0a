use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use crate::cli::SchemaArgs;
use crate::context::load_schema;
use crate::output::print_json;

#[derive(Debug, Serialize)]
struct Report {
    schema: String,
    valid: bool,
    problems: Vec<Problem>,
}

#[derive(Debug, Serialize)]
struct Problem {
    code: &'static str,
    message: String,
}

/// Exit status 1 when the schema has problems.
pub fn run(args: &SchemaArgs) -> Result<ExitCode> {
    let schema = load_schema(&args.schema)?;
    let problems: Vec<Problem> = schema
        .problems()
        .into_iter()
        .map(|err| Problem {
            code: err.code(),
            message: err.to_string(),
        })
        .collect();

    let report = Report {
        schema: schema.id,
        valid: problems.is_empty(),
        problems,
    };
    print_json(&report)?;
    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
