mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    filegate_core::config::load_dotenv();
    filegate_core::observability::init_tracing();
    let cli = Cli::parse();

    if let Commands::CheckName { names } = &cli.command {
        return Ok(exit_code(commands::check_names(names)));
    }

    let gate = commands::build_gate(&cli)?;
    let ok = match &cli.command {
        Commands::Resolve { path } => commands::resolve(&gate, path),
        Commands::CheckName { names } => commands::check_names(names),
        Commands::Detect { path, json } => commands::detect(&gate, path, *json)?,
        Commands::Screen {
            paths,
            screen,
            allow_types,
            cache,
            json,
            compact,
        } => commands::screen(&gate, paths, screen, allow_types, *cache, *json, *compact)?,
        Commands::Report { paths, screen, json } => commands::report(&gate, paths, screen, *json)?,
        Commands::Signatures { json } => commands::signatures(&gate, *json)?,
    };
    Ok(exit_code(ok))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
