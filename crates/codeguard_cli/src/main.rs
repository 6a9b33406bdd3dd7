//! codeguard CLI
//!
//! Aggregates type-check, lint, build, dependency and config diagnostics and
//! gates saves, commits and builds on them.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, HookCommands};
use commands::{run_audit, run_count, run_gate, run_hook_install, run_hook_print, run_hook_uninstall, run_init};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(blocked) => {
            if blocked {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs a command. `Ok(true)` means the check failed or the gate denied.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Audit { format, output } => run_audit(cli, *format, output.as_deref()),
        Commands::Count { format } => run_count(cli, *format),
        Commands::Gate {
            trigger,
            file,
            diagnostics,
            strict,
            confirm_override,
            format,
        } => run_gate(
            cli,
            *trigger,
            file.as_deref(),
            diagnostics.as_deref(),
            *strict,
            *confirm_override,
            *format,
        ),
        Commands::Hook { command } => match command {
            HookCommands::Install {
                kind,
                strict,
                hooks_dir,
            } => run_hook_install(cli, *kind, *strict, hooks_dir.as_deref()).map(|_| false),
            HookCommands::Uninstall { kind, hooks_dir } => {
                run_hook_uninstall(cli, *kind, hooks_dir.as_deref()).map(|_| false)
            }
            HookCommands::Print { kind, strict } => run_hook_print(cli, *kind, *strict).map(|_| false),
        },
        Commands::Init { force } => run_init(cli, *force).map(|_| false),
    }
}
