//! Stamp CLI - document templating.
//!
//! Provides commands for:
//! - `render`: Fill a template with JSON data
//! - `inspect`: List the directives and placeholders of a template

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{InspectArgs, RenderArgs};
use output::Output;

/// Stamp - comment-directive document templating.
#[derive(Parser)]
#[command(name = "stamp", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a template with data.
    Render(RenderArgs),
    /// Describe a template without filling it.
    Inspect(InspectArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Render(args) if args.verbose);

    // render -v forces debug; otherwise RUST_LOG, errors only when unset
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Inspect(args) => args.execute(),
    };

    if let Err(err) = result {
        output.failure(&err);
        std::process::exit(1);
    }
}
