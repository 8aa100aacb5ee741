//! tool::mock
//!
//! Scripted tool for deterministic testing.
//!
//! # Design
//!
//! [`ScriptedTool`] answers every [`VersionTool`] query from an in-memory
//! script and records each call. Clones share state, so a test can hand one
//! clone to a reader and inspect the calls through another.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use vobgraph::tool::mock::ScriptedTool;
//! use vobgraph::tool::{VersionInfo, VersionTool};
//!
//! let tool = ScriptedTool::new();
//! tool.add_element("foo.txt", "f1", false);
//! tool.add_version("foo.txt", r"\main\0", VersionInfo {
//!     date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
//!     ..Default::default()
//! });
//!
//! let mut handle = tool.clone();
//! assert_eq!(handle.version_tree("foo.txt").unwrap(), vec![r"\main\0"]);
//! assert_eq!(tool.calls().len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::parse::{DirEntryTarget, ObjectInfo, VersionInfo};
use super::{ToolError, VersionTool};
use crate::core::types::{
    canonical_element_name, BranchName, ElementVersionPath, Oid, VersionPath,
};

/// Scripted tool for testing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTool {
    inner: Arc<Mutex<ScriptedToolInner>>,
}

#[derive(Debug, Default)]
struct ScriptedToolInner {
    cwd: String,
    elements: HashMap<String, ObjectInfo>,
    trees: HashMap<String, Vec<String>>,
    /// Keyed by the full `element@@version` path.
    predecessors: HashMap<String, VersionPath>,
    metadata: HashMap<String, VersionInfo>,
    directories: HashMap<String, BTreeMap<String, DirEntryTarget>>,
    contents: HashMap<String, Vec<u8>>,
    calls: Vec<ToolCall>,
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ChangeDirectory(String),
    WorkingDirectory,
    VersionTree(String),
    ListDirectory(String),
    ObjectId(String),
    Predecessor(String),
    VersionMetadata(String),
    MaterializeContent(String),
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedToolInner> {
        // a panicking test thread must not hide the script from the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an element and its oid.
    ///
    /// # Panics
    ///
    /// Panics if `oid` is not a valid object id.
    pub fn add_element(&self, name: &str, oid: &str, is_directory: bool) {
        let oid = Oid::new(oid).expect("scripted oid must be valid");
        self.lock()
            .elements
            .insert(name.to_string(), ObjectInfo { oid, is_directory });
    }

    /// Append a version to the element's tree and script its metadata.
    ///
    /// The predecessor is derived the way the tool reports it: the previous
    /// version on the same branch, or for version 0 of a branch the latest
    /// version of the parent branch added so far.
    ///
    /// # Panics
    ///
    /// Panics if `version` is not a full version suffix.
    pub fn add_version(&self, element: &str, version: &str, info: VersionInfo) {
        let path = VersionPath::parse(version).expect("scripted version must be valid");
        let mut inner = self.lock();
        let predecessor = inner.derive_predecessor(element, &path);
        let key = format!("{element}@@{path}");
        if let Some(predecessor) = predecessor {
            inner.predecessors.insert(key.clone(), predecessor);
        }
        inner.metadata.insert(key, info);
        inner
            .trees
            .entry(element.to_string())
            .or_default()
            .push(path.to_string());
    }

    /// Append a raw entry (for example a branch-only line) to the tree.
    pub fn add_tree_entry(&self, element: &str, raw: &str) {
        self.lock()
            .trees
            .entry(element.to_string())
            .or_default()
            .push(raw.to_string());
    }

    /// Override the predecessor reported for a version.
    pub fn set_predecessor(&self, element: &str, version: &str, predecessor: Option<&str>) {
        let key = format!("{element}@@{version}");
        let mut inner = self.lock();
        match predecessor.map(VersionPath::parse) {
            Some(Ok(path)) => {
                inner.predecessors.insert(key, path);
            }
            _ => {
                inner.predecessors.remove(&key);
            }
        }
    }

    /// Script the listing of a directory version.
    pub fn set_directory(
        &self,
        element: &str,
        version: &str,
        entries: impl IntoIterator<Item = (String, DirEntryTarget)>,
    ) {
        self.lock()
            .directories
            .insert(format!("{element}@@{version}"), entries.into_iter().collect());
    }

    /// Script the content of a file version.
    pub fn set_content(&self, element: &str, version: &str, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .contents
            .insert(format!("{element}@@{version}"), bytes.into());
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl ScriptedToolInner {
    fn derive_predecessor(&self, element: &str, path: &VersionPath) -> Option<VersionPath> {
        let tree = self.trees.get(element)?;
        let latest_on = |branches: &[BranchName]| {
            tree.iter()
                .rev()
                .filter_map(|raw| VersionPath::parse(raw).ok())
                .find(|candidate| candidate.branches() == branches)
        };
        if path.number() > 0 {
            if let Some(previous) = latest_on(path.branches()) {
                return Some(previous);
            }
        }
        let parent = &path.branches()[..path.branches().len() - 1];
        if parent.is_empty() {
            return None;
        }
        latest_on(parent)
    }

    fn record(&mut self, call: ToolCall) {
        self.calls.push(call);
    }
}

impl VersionTool for ScriptedTool {
    fn change_directory(&mut self, path: &str) -> Result<(), ToolError> {
        let mut inner = self.lock();
        inner.record(ToolCall::ChangeDirectory(path.to_string()));
        inner.cwd = path.to_string();
        Ok(())
    }

    fn working_directory(&mut self) -> Result<String, ToolError> {
        let mut inner = self.lock();
        inner.record(ToolCall::WorkingDirectory);
        Ok(inner.cwd.clone())
    }

    fn version_tree(&mut self, element: &str) -> Result<Vec<String>, ToolError> {
        let mut inner = self.lock();
        inner.record(ToolCall::VersionTree(element.to_string()));
        Ok(inner.trees.get(element).cloned().unwrap_or_default())
    }

    fn list_directory(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<BTreeMap<String, DirEntryTarget>, ToolError> {
        let key = version.to_string();
        let mut inner = self.lock();
        inner.record(ToolCall::ListDirectory(key.clone()));
        Ok(inner.directories.get(&key).cloned().unwrap_or_default())
    }

    fn object_id(&mut self, element: &str) -> Result<Option<ObjectInfo>, ToolError> {
        let element = canonical_element_name(element);
        let mut inner = self.lock();
        inner.record(ToolCall::ObjectId(element.to_string()));
        Ok(inner.elements.get(element).cloned())
    }

    fn predecessor(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<Option<VersionPath>, ToolError> {
        let key = version.to_string();
        let mut inner = self.lock();
        inner.record(ToolCall::Predecessor(key.clone()));
        Ok(inner.predecessors.get(&key).cloned())
    }

    fn version_metadata(&mut self, version: &ElementVersionPath) -> Result<VersionInfo, ToolError> {
        let key = version.to_string();
        let mut inner = self.lock();
        inner.record(ToolCall::VersionMetadata(key.clone()));
        inner
            .metadata
            .get(&key)
            .cloned()
            .ok_or_else(|| ToolError::Malformed {
                command: format!("desc {key}"),
                detail: "no metadata scripted".to_string(),
            })
    }

    fn materialize_content(&mut self, version: &ElementVersionPath) -> Result<PathBuf, ToolError> {
        let key = version.to_string();
        let bytes = {
            let mut inner = self.lock();
            inner.record(ToolCall::MaterializeContent(key.clone()));
            inner.contents.get(&key).cloned()
        };
        let path = std::env::temp_dir().join(format!("vobgraph-{}", Uuid::new_v4()));
        match bytes {
            Some(bytes) => {
                std::fs::write(&path, bytes)?;
                Ok(path)
            }
            None => Err(ToolError::ContentUnavailable { version: key, path }),
        }
    }
}
