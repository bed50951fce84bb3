//! ERDDAP deployment CLI
//!
//! Builds datasets.xml from datasets.d fragments, syncs them from a git
//! repository and flags changed datasets for reload.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::SyncOptions;
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level);

    let ctx = Context::new(cli.global, std::env::current_dir()?);
    execute_command(&ctx, cli.command)
}

/// Log to stderr so command output on stdout stays scriptable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Save { output } => commands::run_save(ctx, &output),
        Commands::Sync {
            repo,
            branch,
            local_repo_path,
            hard_flag,
            hard_flag_dir,
        } => {
            let options = SyncOptions {
                repo,
                branch,
                local_repo_path: ctx.cwd.join(local_repo_path),
                hard_flag,
                hard_flag_dir: ctx.expand_path(&hard_flag_dir)?,
            };
            commands::run_sync(ctx, &options)
        }
        Commands::Diff {
            against,
            json,
            patch,
        } => commands::run_diff(ctx, &against, json, patch),
    }
}
