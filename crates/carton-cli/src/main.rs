//! # carton-cli
//!
//! Minimal package manager CLI.
//!
//! This is the main entry point for the `carton` tool. It handles command
//! parsing, sets up logging, and dispatches to the command handlers.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::CommandContext;

/// A minimal package manager: resolve, lock, fetch, verify, unpack
#[derive(Parser)]
#[command(name = "carton", version, about = "A minimal package manager")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create carton.json in the current directory
    Init {
        /// Project name (defaults to "my-project")
        name: Option<String>,
    },
    /// Add a dependency, as `name` or `name@version`
    Add { package: String },
    /// Resolve carton.json into carton.lock and install all packages
    Install,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            std::process::exit(1);
        },
    };

    let result = rt.block_on(async {
        let ctx = CommandContext::new().await?;
        commands::dispatch_command(cli.command, &ctx).await
    });

    if let Err(err) = result {
        let out = output::OutputHandler::new();
        out.error(&err.to_string());
        if let Some(suggestion) = err.suggestion() {
            out.info(suggestion);
        }
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "carton_cli={level},carton_core={level},carton_lockfile={level},carton_registry={level},carton_resolver={level},carton_cache={level}"
        ))
        .with_target(false)
        .init();
}
