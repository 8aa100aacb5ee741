//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vobgraph - Rebuild ClearCase version graphs for history migration
#[derive(Parser, Debug)]
#[command(name = "vobgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if vobgraph was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; only errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read element and version history through cleartool
    Read {
        /// View directory the element lists are relative to
        #[arg(long)]
        root: Option<PathBuf>,

        /// File listing file elements, one per line
        #[arg(long, value_name = "FILE")]
        elements: Option<PathBuf>,

        /// File listing directory elements, one per line
        #[arg(long, value_name = "FILE")]
        directories: Option<PathBuf>,

        /// File listing individual versions (`path@@\main\...\N`), one per line
        #[arg(long, value_name = "FILE")]
        versions: Option<PathBuf>,

        /// Ignore versions created after this date (default: now)
        #[arg(long, value_name = "DATE")]
        origin_date: Option<String>,

        /// Start from these snapshots (merged in order, first wins)
        #[arg(long = "load", value_name = "SNAPSHOT")]
        load: Vec<PathBuf>,

        /// Write the resulting graph to this snapshot
        #[arg(long, value_name = "SNAPSHOT")]
        save: Option<PathBuf>,

        /// Write the versions discovered from --versions as JSON
        #[arg(long, value_name = "FILE", requires = "versions")]
        new_versions: Option<PathBuf>,
    },

    /// Summarize one or more snapshots
    Inspect {
        /// Snapshots to load (merged in order)
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,

        /// Show one element in detail
        #[arg(long, value_name = "OID")]
        element: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge snapshots into one
    Merge {
        /// Snapshot to write
        #[arg(short, long, value_name = "SNAPSHOT")]
        output: PathBuf,

        /// Snapshots to merge, first wins on conflicts
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
    },

    /// Write the content of one version to a temporary file
    Fetch {
        /// View directory the path is relative to
        #[arg(long)]
        root: Option<PathBuf>,

        /// Versioned path, e.g. `src/main.c@@\main\3`
        version: String,
    },
}
