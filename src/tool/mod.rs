//! tool
//!
//! Single interface to the version control tool.
//!
//! # Architecture
//!
//! This module is the only doorway to the external tool. Everything above it
//! talks to the [`VersionTool`] trait and receives typed answers:
//! - [`session::ToolSession`] drives a live interactive subprocess
//! - [`mock::ScriptedTool`] answers from an in-memory script, for tests
//!
//! Command strings and stream framing live in [`protocol`], response parsing
//! in [`parse`].
//!
//! # Invariants
//!
//! - At most one command is in flight per session (`&mut self` everywhere)
//! - "Not found" is an empty answer (`None`/empty list), never an error
//! - Temporary files returned by [`VersionTool::materialize_content`] belong
//!   to the caller
//!
//! # Example
//!
//! ```no_run
//! use vobgraph::tool::session::{SessionConfig, ToolSession};
//! use vobgraph::tool::VersionTool;
//!
//! let mut tool = ToolSession::spawn(&SessionConfig::default())?;
//! tool.change_directory("/vobs/project")?;
//! if let Some(info) = tool.object_id("src/main.c")? {
//!     println!("{} directory={}", info.oid, info.is_directory);
//! }
//! # Ok::<(), vobgraph::tool::ToolError>(())
//! ```

pub mod mock;
pub mod parse;
pub mod protocol;
pub mod session;

pub use parse::{DirEntryTarget, ObjectInfo, VersionInfo};
pub use protocol::ProtocolError;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::{ElementVersionPath, VersionPath};

/// Errors from tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("i/o error talking to the tool: {0}")]
    Io(#[from] std::io::Error),

    /// The tool closed its output before answering.
    #[error("tool terminated while running '{command}'")]
    Terminated { command: String },

    #[error("unexpected answer to '{command}': {detail}")]
    Malformed { command: String, detail: String },

    #[error("content of {version} was not written to '{path}'")]
    ContentUnavailable { version: String, path: PathBuf },
}

impl ToolError {
    pub(crate) fn malformed(command: &str, detail: parse::Malformed) -> Self {
        ToolError::Malformed {
            command: command.to_string(),
            detail: detail.0,
        }
    }
}

/// Typed queries against the version control tool.
///
/// Element paths are canonical (no trailing `@@`); implementations add the
/// extended-name suffix where the tool needs it.
pub trait VersionTool {
    fn change_directory(&mut self, path: &str) -> Result<(), ToolError>;

    fn working_directory(&mut self) -> Result<String, ToolError>;

    /// Every version suffix of the element, obsolete ones included, in
    /// creation order. Branch-only entries are not filtered.
    fn version_tree(&mut self, element: &str) -> Result<Vec<String>, ToolError>;

    /// Content of a directory version.
    fn list_directory(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<BTreeMap<String, DirEntryTarget>, ToolError>;

    /// Oid and kind of an element, `None` if the tool does not know it.
    fn object_id(&mut self, element: &str) -> Result<Option<ObjectInfo>, ToolError>;

    /// Previous version, `None` only for the first version of the root branch.
    fn predecessor(&mut self, version: &ElementVersionPath)
        -> Result<Option<VersionPath>, ToolError>;

    fn version_metadata(&mut self, version: &ElementVersionPath) -> Result<VersionInfo, ToolError>;

    /// Write the version's content to a fresh temporary file and return its
    /// path. The caller deletes it.
    fn materialize_content(&mut self, version: &ElementVersionPath) -> Result<PathBuf, ToolError>;
}

impl<T: VersionTool + ?Sized> VersionTool for &mut T {
    fn change_directory(&mut self, path: &str) -> Result<(), ToolError> {
        (**self).change_directory(path)
    }

    fn working_directory(&mut self) -> Result<String, ToolError> {
        (**self).working_directory()
    }

    fn version_tree(&mut self, element: &str) -> Result<Vec<String>, ToolError> {
        (**self).version_tree(element)
    }

    fn list_directory(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<BTreeMap<String, DirEntryTarget>, ToolError> {
        (**self).list_directory(version)
    }

    fn object_id(&mut self, element: &str) -> Result<Option<ObjectInfo>, ToolError> {
        (**self).object_id(element)
    }

    fn predecessor(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<Option<VersionPath>, ToolError> {
        (**self).predecessor(version)
    }

    fn version_metadata(&mut self, version: &ElementVersionPath) -> Result<VersionInfo, ToolError> {
        (**self).version_metadata(version)
    }

    fn materialize_content(&mut self, version: &ElementVersionPath) -> Result<PathBuf, ToolError> {
        (**self).materialize_content(version)
    }
}
