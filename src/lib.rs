//! vobgraph - Version graph reconstruction for ClearCase history migration
//!
//! vobgraph drives an interactive `cleartool` session, rebuilds the element,
//! branch and version graph of a view up to a cutoff date, and persists it as
//! snapshots that later runs can extend.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to history)
//! - [`history`] - Bulk and point-in-time discovery plus the fixup pass
//! - [`tool`] - Tool session protocol and the `VersionTool` seam
//! - [`core`] - Domain types, graph model, snapshots and configuration
//! - [`ui`] - Output and logging setup
//!
//! # Correctness Invariants
//!
//! 1. Every reference in a graph points at an element or version in the same graph
//! 2. Branch versions are strictly increasing and never dated after the cutoff
//! 3. Re-reading what a graph already holds never changes it

pub mod cli;
pub mod core;
pub mod history;
pub mod tool;
pub mod ui;
