//! core
//!
//! Domain types, the version graph model, snapshots and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, BranchName, VersionKey, version paths
//! - [`model`] - Version graph: elements, branches, versions and their links
//! - [`snapshot`] - Versioned JSON snapshots of a graph
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Cross references are keys, never pointers
//! - Schemas are strict and self-describing

pub mod config;
pub mod model;
pub mod snapshot;
pub mod types;
