//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting, verbosity and the log subscriber
//!
//! # Design
//!
//! All human output goes through this module so that `--quiet` and
//! `--debug` behave the same for every command.

pub mod output;
