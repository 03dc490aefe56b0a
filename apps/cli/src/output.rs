//! Stdout rendering. Everything a command prints is one JSON document.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to serialise output")?;
    writeln!(out).context("failed to write output")?;
    Ok(())
}
