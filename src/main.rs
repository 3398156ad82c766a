//! Main entry point for PS Commander.
//!
//! Parses the command line, initializes logging, and drives a
//! [`CommandRunner`] with console output. Ctrl-C stops the running command.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use ps_commander::presets::{PresetTable, store};
use ps_commander::runner::{CommandRunner, ConsoleSink, RunError, ShellConfig};
use ps_commander::utils;

/// Exit code for rejected input, matching clap's usage errors.
const USAGE_EXIT: u8 = 2;

/// PS Commander - run shell commands and stream their output
#[derive(Parser)]
#[command(name = "pscommander", version)]
#[command(about = "Run shell commands and stream their output", long_about = None)]
struct Cli {
    /// User preset file (JSON)
    #[arg(long, global = true, env = "PSCOMMANDER_PRESETS")]
    presets: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunOptions {
    /// Resolve to the help command instead of running it
    #[arg(long)]
    help_mode: bool,

    /// Interpreter program (defaults to PowerShell on Windows, /bin/sh elsewhere)
    #[arg(long)]
    shell: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command line (or a preset label)
    Run {
        #[command(flatten)]
        options: RunOptions,

        /// Command line; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a predefined command by label
    Preset {
        #[command(flatten)]
        options: RunOptions,

        /// Preset label, e.g. "List Processes"
        #[arg(required = true)]
        label: Vec<String>,
    },

    /// List predefined commands
    Presets {
        /// Show help commands instead
        #[arg(long)]
        help_mode: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log records are flushed on exit
    let _log_guard = utils::logger::init_logging();

    let presets_path = cli.presets.unwrap_or_else(store::default_presets_path);
    let table = store::load_table(&presets_path)?;

    match cli.command {
        Commands::Run { options, command } => {
            let input = command.join(" ");
            let command_line = table.resolve(&input, options.help_mode);
            run_command(&options, &command_line).await
        }
        Commands::Preset { options, label } => {
            let label = label.join(" ");
            let preset = table.get(&label).with_context(|| {
                format!("Unknown preset {:?}. Run `pscommander presets` to list them.", label)
            })?;
            run_command(&options, &preset.command_for(options.help_mode)).await
        }
        Commands::Presets { help_mode } => {
            print_presets(&table, help_mode);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn shell_for(options: &RunOptions) -> ShellConfig {
    let shell = ShellConfig::from_env();
    match &options.shell {
        Some(program) => shell.with_program(program.as_str()),
        None => shell,
    }
}

/// Run one command to completion, mirroring its exit code.
async fn run_command(options: &RunOptions, command_line: &str) -> Result<ExitCode> {
    let runner = CommandRunner::new(shell_for(options));

    let handle = match runner.start(command_line, ConsoleSink) {
        Ok(handle) => handle,
        Err(e @ RunError::EmptyCommand) => {
            eprintln!("Warning: {}", e);
            return Ok(ExitCode::from(USAGE_EXIT));
        }
        Err(e) => return Err(e.into()),
    };

    let wait = runner.wait(&handle);
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!(run = %handle.id(), "Ctrl-C received, stopping command");
                if let Err(e) = runner.kill(&handle) {
                    debug!(error = %e, "Nothing to stop");
                }
            }
        }
    };

    Ok(ExitCode::from(exit_byte(outcome.exit_code())))
}

/// Clamp a child exit code into the range a process can report.
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn print_presets(table: &PresetTable, help_mode: bool) {
    for preset in table.entries() {
        println!("{}\t{}", preset.label, preset.command_for(help_mode));
    }
}
