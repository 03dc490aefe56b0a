//! `order` and `affected`

use std::process::ExitCode;

use anyhow::{Result, bail};
use serde_json::json;

use crate::cli::{AffectedArgs, SchemaArgs};
use crate::context::Session;
use crate::output::print_json;

pub fn run_order(session: &Session, args: &SchemaArgs) -> Result<ExitCode> {
    let engine = session.engine(&args.schema)?;
    let graph = engine.graph();
    print_json(&json!({
        "order": graph.evaluation_order(),
        "cycles": graph.cycles(),
    }))?;
    Ok(ExitCode::SUCCESS)
}

/// Affected fields, listed in evaluation order.
pub fn run_affected(session: &Session, args: &AffectedArgs) -> Result<ExitCode> {
    let engine = session.engine(&args.schema.schema)?;
    let graph = engine.graph();
    if let Some(unknown) = args.changed.iter().find(|id| !graph.contains(id)) {
        bail!("unknown field `{unknown}`");
    }

    let affected = graph.affected_fields(&args.changed);
    let ordered: Vec<String> = graph
        .evaluation_order()
        .into_iter()
        .filter(|id| affected.contains(id))
        .collect();
    print_json(&json!({
        "changed": args.changed,
        "affected": ordered,
    }))?;
    Ok(ExitCode::SUCCESS)
}
