//! Topicstore CLI
//!
//! Command-line tools for inspecting and maintaining a topic store directory.
//!
//! # Commands
//!
//! - `inspect` - Display per-topic message and subscription counts
//! - `verify` - Open every topic, running reconciliation, and report repairs
//! - `purge` - Remove every message of one topic
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::CliError;

/// Topicstore command-line tools.
#[derive(Parser)]
#[command(name = "topicstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-topic statistics
    Inspect {
        /// Only inspect this topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Open every topic and report reconciliation repairs
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove every message of a topic, keeping its subscriptions
    Purge {
        /// Topic to purge
        #[arg(short, long)]
        topic: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { topic, format } => {
            let path = cli.path.ok_or(CliError::MissingPath("inspect"))?;
            commands::inspect::run(&path, topic.as_deref(), &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or(CliError::MissingPath("verify"))?;
            commands::verify::run(&path, &format)?;
        }
        Commands::Purge { topic } => {
            let path = cli.path.ok_or(CliError::MissingPath("purge"))?;
            commands::purge::run(&path, &topic)?;
        }
        Commands::Version => {
            println!("Topicstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Topicstore Core v{}", topicstore_core::VERSION);
        }
    }

    Ok(())
}
