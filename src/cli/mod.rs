//! cli
//!
//! Command-line interface layer for vobgraph.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Build the log subscriber and the configuration
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, scopes a tracing
//! subscriber around the run and dispatches to [`commands`], which drive
//! [`crate::history`] and [`crate::core::snapshot`].

pub mod args;
pub mod commands;

pub use args::Cli;

use crate::ui::output::{self, Verbosity};
use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let ctx = commands::Context {
        cwd: cli.cwd.clone(),
        verbosity,
    };

    tracing::subscriber::with_default(output::subscriber(verbosity), || {
        commands::dispatch(cli.command, &ctx)
    })
}
