//! Postalgic — incremental publisher for statically generated blogs.
//!
//! # Usage
//!
//! ```text
//! postalgic init <site> <output-dir>
//! postalgic site list
//! postalgic target add <site> <name> s3|git|sftp|archive [options]
//! postalgic target remove <site> <name>
//! postalgic publish <site> [--target <name>] [--full] [--dry-run]
//! postalgic status [--json]
//! postalgic diff <site> [--target <name>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{
    diff::DiffArgs, init::InitArgs, publish::PublishArgs, site::SiteCommand,
    status::StatusArgs, target::TargetCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "postalgic",
    version,
    about = "Publish only what changed in a generated static site",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a site and the directory its generator writes into.
    Init(InitArgs),

    /// Inspect registered sites.
    Site {
        #[command(subcommand)]
        command: SiteCommand,
    },

    /// Configure where a site is published.
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Upload changed files and delete removed ones on each target.
    Publish(PublishArgs),

    /// Show publish status of every site and target.
    Status(StatusArgs),

    /// List what the next publish would upload and delete.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Site { command } => commands::site::run(command),
        Commands::Target { command } => commands::target::run(command),
        Commands::Publish(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
