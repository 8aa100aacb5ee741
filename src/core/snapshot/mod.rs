//! core::snapshot
//!
//! Persisted form of the version graph, used to resume and extend imports
//! across runs.
//!
//! - [`schema`] - flat records and the flatten/restore passes
//! - [`store`] - atomic, locked file storage and multi-file merge

pub mod schema;
pub mod store;

pub use schema::{SchemaError, SnapshotV1};
pub use store::{load_all, SnapshotError, SnapshotStore};
