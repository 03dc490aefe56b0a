//! `formwork` -- evaluate reactive form schemas from the command line.
//!
//! Parses arguments with clap, layers configuration with figment, installs
//! the logger and dispatches to a command handler. Results go to stdout as
//! JSON; logs and errors go to stderr.

mod cli;
mod commands;
mod context;
mod output;
mod settings;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use context::Session;
use settings::Settings;

/// Exit status for failures other than an invalid schema report.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(&cli.global)?;
    let _guard = formwork_log::init(&settings.log).context("failed to initialise logging")?;
    let session = Session::new(settings, &cli.global.vars);

    match &cli.command {
        Commands::Evaluate(args) => commands::evaluate::run(&session, args),
        Commands::Order(args) => commands::graph::run_order(&session, args),
        Commands::Affected(args) => commands::graph::run_affected(&session, args),
        Commands::Suggest(args) => commands::suggest::run(&session, args),
        Commands::Validate(args) => commands::validate::run(args),
    }
}
