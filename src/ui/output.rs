//! ui::output
//!
//! Output formatting and log setup.
//!
//! # Design
//!
//! Human output goes to stdout and respects the quiet flag. Log events go to
//! stderr through a subscriber built here; the binary scopes it around the
//! run with `tracing::subscriber::with_default` instead of installing a
//! process-global logger.

use std::fmt::Display;

use tracing_subscriber::EnvFilter;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. Quiet wins over debug.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Build the stderr log subscriber for a run.
///
/// `RUST_LOG` overrides the level implied by `verbosity`.
pub fn subscriber(verbosity: Verbosity) -> impl tracing::Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity == Verbosity::Debug)
        .with_writer(std::io::stderr)
        .finish()
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format `key: value` rows with aligned values.
pub fn format_table<K: Display, V: Display>(rows: &[(K, V)], indent: &str) -> String {
    let keys: Vec<String> = rows.iter().map(|(k, _)| k.to_string()).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);
    keys.iter()
        .zip(rows)
        .map(|(key, (_, value))| format!("{indent}{key:<width$}  {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false).default_filter(), "info");
    }

    #[test]
    fn table_aligns_values() {
        let table = format_table(&[("elements", 3), ("versions", 12), ("merge links", 1)], "  ");
        assert_eq!(
            table,
            "  elements     3\n  versions     12\n  merge links  1"
        );
    }
}
