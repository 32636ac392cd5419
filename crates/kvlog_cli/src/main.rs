//! kvlog CLI
//!
//! Command-line tools for kvlog binlog files.
//!
//! # Commands
//!
//! - `inspect` - Display record counts and sizes
//! - `verify` - Check a log for corrupted regions
//! - `dump` - Print every record and skipped region

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kvlog command-line binlog tools.
#[derive(Parser)]
#[command(name = "kvlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts and sizes
    Inspect {
        /// Path to the binlog file
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a binlog for corrupted regions
    Verify {
        /// Path to the binlog file
        path: PathBuf,
    },

    /// Print records and skipped regions for debugging
    Dump {
        /// Path to the binlog file
        path: PathBuf,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Start scanning at this byte offset
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Include each record's table/key/value entries
        #[arg(short, long)]
        entries: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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
        Commands::Inspect { path, format } => {
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { path } => {
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            path,
            limit,
            offset,
            entries,
            format,
        } => {
            commands::dump::run(&path, limit, offset, entries, &format)?;
        }
        Commands::Version => {
            println!("kvlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kvlog core v{}", kvlog_core::VERSION);
        }
    }

    Ok(())
}
