//! Rootstrap CLI - install and manage root filesystems shipped as tar.xz
//! archives.

mod cli;
mod commands;
mod error;
mod output;
mod progress;
mod rootfs;

use clap::Parser;
use progress::CliProgress;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet, cli.command.name());
    let show_progress = !cli.quiet && !cli.json && CliProgress::should_show();

    let result = match &cli.command {
        cli::Commands::Extract(args) => commands::extract::execute(args, &*formatter, show_progress),
        cli::Commands::Install(args) => commands::install::execute(args, &*formatter, show_progress),
        cli::Commands::Status(args) => commands::status::execute(args, &*formatter),
        cli::Commands::Remove(args) => commands::remove::execute(args, &*formatter),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        formatter.format_error(&err);
        std::process::exit(1);
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
