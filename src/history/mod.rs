//! history
//!
//! Reconstruction of the version graph from point queries.
//!
//! # Architecture
//!
//! [`HistoryReader`] owns a [`VersionTool`], the graph being built, a
//! [`FixupQueue`] and a [`Diagnostics`] collector. It reads in two modes:
//!
//! - **Bulk** ([`HistoryReader::read_element`]): the whole version tree of one
//!   element, grouped by branch in first-seen order. A new branch forks from
//!   the latest version read so far on its parent branch. Reading stops at
//!   the first version after the cutoff.
//! - **Point** ([`HistoryReader::read_version`]): one version and every
//!   missing ancestor, walked back through predecessors and then replayed
//!   oldest first. Re-reading a version already present changes nothing.
//!
//! Both modes materialize versions the same way (metadata, cutoff check,
//! directory listing, merge hyperlinks). References to elements or branches
//! not read yet go to the fixup queue, resolved once by
//! [`HistoryReader::resolve_fixups`].
//!
//! # Errors
//!
//! Missing elements, future versions and unresolved references are recorded
//! in [`Diagnostics`] and never interrupt a run. A point read that cannot
//! attach a version to its branch (no predecessor outside the root case,
//! unresolved branching point) is [`HistoryError::Inconsistent`] and aborts.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use vobgraph::core::model::VersionGraph;
//! use vobgraph::history::report::Diagnostics;
//! use vobgraph::history::HistoryReader;
//! use vobgraph::tool::mock::ScriptedTool;
//! use vobgraph::tool::VersionInfo;
//!
//! let tool = ScriptedTool::new();
//! tool.add_element("foo.txt", "f1", false);
//! tool.add_version("foo.txt", r"\main\0", VersionInfo {
//!     date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
//!     ..Default::default()
//! });
//!
//! let cutoff = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
//! let mut reader = HistoryReader::new(tool, VersionGraph::new(), cutoff, Diagnostics::new());
//! reader.read_element("foo.txt")?;
//! reader.resolve_fixups();
//! assert_eq!(reader.graph().stats().versions, 1);
//! # Ok::<(), vobgraph::history::HistoryError>(())
//! ```

pub mod fixup;
pub mod report;

pub use fixup::{ContentFixup, FixupQueue, FixupSummary, MergeFixup};
pub use report::{Diagnostics, Issue, Severity};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::model::{
    Author, Element, ElementKind, MergeDirection, ModelError, Version, VersionGraph,
};
use crate::core::types::{
    canonical_element_name, BranchName, BranchVersion, ElementVersionPath, Oid, VersionKey,
    VersionPath,
};
use crate::tool::{DirEntryTarget, ToolError, VersionInfo, VersionTool};

/// Fatal errors from history reading.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The tool's answers cannot be assembled into a consistent history.
    #[error("inconsistent history for {element}: {detail}")]
    Inconsistent { element: String, detail: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to read list '{path}': {source}")]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of a bulk element read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementOutcome {
    /// The tool does not know the element.
    NotFound,
    /// The oid was already in the graph; nothing was queried further.
    AlreadyPresent,
    /// The element was read, with this many accepted versions.
    Read { versions: usize },
}

/// Result of a point version read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOutcome {
    /// The line is not a `element@@\branch\N` path.
    Unparsable,
    /// The tool does not know the element.
    NotFound,
    /// The branch already reaches this version number.
    AlreadyPresent,
    /// The version (and any missing ancestors) was added.
    Added,
    /// The version, or one of its missing ancestors, is after the cutoff.
    Future,
}

/// Progress reporting intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressIntervals {
    pub files: usize,
    pub directories: usize,
    pub versions: usize,
}

impl Default for ProgressIntervals {
    fn default() -> Self {
        Self {
            files: 100,
            directories: 20,
            versions: 100,
        }
    }
}

impl ProgressIntervals {
    /// The same interval for every list.
    pub fn uniform(every: usize) -> Self {
        let every = every.max(1);
        Self {
            files: every,
            directories: every,
            versions: every,
        }
    }
}

/// Input lists of a full read. One path per line, blank lines ignored.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub elements_file: Option<PathBuf>,
    pub directories_file: Option<PathBuf>,
    pub versions_file: Option<PathBuf>,
}

/// What a full read did.
#[derive(Debug, Clone, Default)]
pub struct ReadSummary {
    pub files_read: usize,
    pub directories_read: usize,
    pub versions_requested: usize,
    /// Newly accepted versions, in order, when a versions list was given.
    pub new_versions: Option<Vec<VersionKey>>,
    pub fixups: FixupSummary,
}

/// Result of materializing one version.
enum Materialized {
    Accepted(VersionKey),
    Future,
}

/// A directory entry that can be attached as soon as its version exists.
enum EntryChild {
    Known(Oid),
    /// Pseudo-element, only added to the graph with the version.
    Symlink(Element),
}

/// Builds a [`VersionGraph`] through a [`VersionTool`].
pub struct HistoryReader<T: VersionTool> {
    tool: T,
    graph: VersionGraph,
    cutoff: DateTime<Utc>,
    fixups: FixupQueue,
    diagnostics: Diagnostics,
    progress: ProgressIntervals,
}

impl<T: VersionTool> HistoryReader<T> {
    /// Create a reader that extends `graph` (empty for a fresh import).
    ///
    /// Versions dated after `cutoff` are never added.
    pub fn new(tool: T, graph: VersionGraph, cutoff: DateTime<Utc>, diagnostics: Diagnostics) -> Self {
        Self {
            tool,
            graph,
            cutoff,
            fixups: FixupQueue::new(),
            diagnostics,
            progress: ProgressIntervals::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressIntervals) -> Self {
        self.progress = progress;
        self
    }

    pub fn graph(&self) -> &VersionGraph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Number of fixups waiting for [`Self::resolve_fixups`].
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }

    /// Finish and hand back the graph, the diagnostics and the tool.
    pub fn into_parts(self) -> (VersionGraph, Diagnostics, T) {
        (self.graph, self.diagnostics, self.tool)
    }

    /// Move the tool into the view directory all paths are relative to.
    pub fn change_directory(&mut self, root: &Path) -> Result<(), HistoryError> {
        let root = root.to_string_lossy();
        self.tool.change_directory(&root)?;
        tracing::info!(root = %root, "changed tool directory");
        Ok(())
    }

    /// Run a full read: files, then directories, then versions, then fixups.
    pub fn read(&mut self, request: &ReadRequest) -> Result<ReadSummary, HistoryError> {
        let mut summary = ReadSummary::default();

        if let Some(path) = &request.elements_file {
            summary.files_read = self.read_element_list(path, "file", self.progress.files)?;
        }
        if let Some(path) = &request.directories_file {
            summary.directories_read =
                self.read_element_list(path, "directory", self.progress.directories)?;
        }
        if let Some(path) = &request.versions_file {
            let lines = read_list(path)?;
            tracing::info!(list = %path.display(), count = lines.len(), "start reading individual versions");
            let mut new_versions = Vec::new();
            for (i, line) in lines.iter().enumerate() {
                if (i + 1) % self.progress.versions.max(1) == 0 {
                    tracing::info!(done = i + 1, total = lines.len(), "reading versions");
                }
                self.read_version_line(line, &mut new_versions)?;
            }
            tracing::info!(new_versions = new_versions.len(), "stop reading individual versions");
            summary.versions_requested = lines.len();
            summary.new_versions = Some(new_versions);
        }

        summary.fixups = self.resolve_fixups();
        Ok(summary)
    }

    fn read_element_list(&mut self, path: &Path, what: &str, every: usize) -> Result<usize, HistoryError> {
        let lines = read_list(path)?;
        tracing::info!(list = %path.display(), count = lines.len(), "start reading {what} elements");
        for (i, line) in lines.iter().enumerate() {
            if (i + 1) % every.max(1) == 0 {
                tracing::info!(done = i + 1, total = lines.len(), "reading {what} elements");
            }
            self.read_element(line)?;
        }
        tracing::info!(list = %path.display(), "stop reading {what} elements");
        Ok(lines.len())
    }

    /// Resolve every queued fixup against the graph as it is now.
    pub fn resolve_fixups(&mut self) -> FixupSummary {
        self.fixups.resolve(&mut self.graph, &mut self.diagnostics)
    }

    // =========================================================================
    // Bulk mode
    // =========================================================================

    /// Read the whole version tree of one element.
    ///
    /// Elements whose oid is already in the graph are left untouched.
    pub fn read_element(&mut self, name: &str) -> Result<ElementOutcome, HistoryError> {
        let name = canonical_element_name(name);
        let Some(info) = self.tool.object_id(name)? else {
            self.diagnostics.record(Issue::ElementNotFound {
                element: name.to_string(),
            });
            return Ok(ElementOutcome::NotFound);
        };
        let oid = info.oid;
        if self.graph.contains(&oid) {
            self.diagnostics.record(Issue::AlreadyRead {
                element: name.to_string(),
                oid,
            });
            return Ok(ElementOutcome::AlreadyPresent);
        }

        let kind = if info.is_directory {
            ElementKind::Directory
        } else {
            ElementKind::File
        };
        tracing::debug!(element = name, oid = %oid, ?kind, "start reading element");
        self.graph.insert(Element::new(oid.clone(), name, kind))?;

        let mut skipped: BTreeSet<BranchName> = BTreeSet::new();
        let mut accepted = 0;
        for raw in self.tool.version_tree(name)? {
            // every branch starts with an entry that has no version number
            if !VersionPath::is_full_version(&raw) {
                continue;
            }
            let path = match VersionPath::parse(&raw) {
                Ok(path) => path,
                Err(_) => {
                    self.diagnostics.record(Issue::UnparsableVersion {
                        line: format!("{name}@@{raw}"),
                    });
                    continue;
                }
            };
            if skipped.contains(path.branch()) {
                continue;
            }
            if !self.open_bulk_branch(&oid, name, &path)? {
                skipped.insert(path.branch().clone());
                continue;
            }
            match self.materialize(&oid, name, &path)? {
                Materialized::Accepted(_) => accepted += 1,
                Materialized::Future => {
                    self.element_mut(&oid, name)?
                        .remove_branch_if_empty(path.branch());
                    // creation order: every later entry is newer still
                    break;
                }
            }
        }
        tracing::debug!(element = name, oid = %oid, versions = accepted, "stop reading element");
        Ok(ElementOutcome::Read { versions: accepted })
    }

    /// Make sure the branch of `path` exists. Returns false when it cannot
    /// be attached and its entries must be skipped.
    fn open_bulk_branch(&mut self, oid: &Oid, name: &str, path: &VersionPath) -> Result<bool, HistoryError> {
        let element = self.element_mut(oid, name)?;
        let branch = path.branch();
        if element.branch(branch).is_some() {
            return Ok(true);
        }

        let branching_point = match path.parent_branch() {
            None if element.branches().any(|b| b.branching_point().is_none()) => None,
            None => {
                element.add_branch(branch.clone(), None)?;
                return Ok(true);
            }
            // a new branch starts from the last version read on its parent
            Some(parent) => element
                .latest(parent)
                .map(|latest| BranchVersion::new(parent.clone(), latest.number())),
        };

        match branching_point {
            Some(point) => {
                element.add_branch(branch.clone(), Some(point))?;
                Ok(true)
            }
            None => {
                self.diagnostics.record(Issue::MissingParentBranch {
                    element: name.to_string(),
                    oid: oid.clone(),
                    branch: branch.clone(),
                    parent: path.parent_branch().cloned(),
                });
                Ok(false)
            }
        }
    }

    // =========================================================================
    // Point mode
    // =========================================================================

    /// Parse one line of a versions list and read it.
    pub fn read_version_line(
        &mut self,
        line: &str,
        new_versions: &mut Vec<VersionKey>,
    ) -> Result<VersionOutcome, HistoryError> {
        match ElementVersionPath::parse(line) {
            Ok(path) => self.read_version(&path, new_versions),
            Err(_) => {
                self.diagnostics.record(Issue::UnparsableVersion {
                    line: line.trim().to_string(),
                });
                Ok(VersionOutcome::Unparsable)
            }
        }
    }

    /// Read one version and every ancestor missing from the graph.
    ///
    /// Accepted versions are appended to `new_versions`, oldest first.
    pub fn read_version(
        &mut self,
        path: &ElementVersionPath,
        new_versions: &mut Vec<VersionKey>,
    ) -> Result<VersionOutcome, HistoryError> {
        let name = path.element();
        let Some(info) = self.tool.object_id(name)? else {
            self.diagnostics.record(Issue::ElementNotFound {
                element: name.to_string(),
            });
            return Ok(VersionOutcome::NotFound);
        };
        let oid = info.oid;

        match self.graph.get_mut(&oid) {
            Some(element) => {
                if let Some(previous) = element.rename(name) {
                    // the current view shows the element under another name
                    self.diagnostics.record(Issue::Renamed {
                        oid: oid.clone(),
                        from: previous,
                        to: name.to_string(),
                    });
                }
            }
            None => {
                let kind = if info.is_directory {
                    ElementKind::Directory
                } else {
                    ElementKind::File
                };
                self.graph.insert(Element::new(oid.clone(), name, kind))?;
            }
        }

        if self.is_present(&oid, path.version()) {
            return Ok(VersionOutcome::AlreadyPresent);
        }

        // walk back to the first ancestor already known (or the very first version)
        let mut chain: Vec<(VersionPath, Option<VersionPath>)> = Vec::new();
        let mut current = path.version().clone();
        loop {
            let predecessor = self
                .tool
                .predecessor(&ElementVersionPath::new(name, current.clone()))?;
            if predecessor.is_none() && !is_first_version(&current) {
                return Err(HistoryError::Inconsistent {
                    element: name.to_string(),
                    detail: format!("no predecessor for {current}"),
                });
            }
            let next = predecessor
                .clone()
                .filter(|previous| !self.is_present(&oid, previous));
            chain.push((current, predecessor));
            match next {
                Some(previous) => current = previous,
                None => break,
            }
        }

        for (version, predecessor) in chain.into_iter().rev() {
            tracing::debug!(element = name, oid = %oid, version = %version, "reading version");
            self.open_point_branch(&oid, name, &version, predecessor.as_ref())?;
            match self.materialize(&oid, name, &version)? {
                Materialized::Accepted(key) => new_versions.push(key),
                Materialized::Future => {
                    self.element_mut(&oid, name)?
                        .remove_branch_if_empty(version.branch());
                    // descendants of a future version are future too
                    return Ok(VersionOutcome::Future);
                }
            }
        }
        Ok(VersionOutcome::Added)
    }

    fn is_present(&self, oid: &Oid, version: &VersionPath) -> bool {
        self.graph
            .get(oid)
            .and_then(|element| element.latest(version.branch()))
            .is_some_and(|latest| latest.number() >= version.number())
    }

    /// Create the branch of `version` if needed, forking from its
    /// already-read predecessor on the parent branch.
    fn open_point_branch(
        &mut self,
        oid: &Oid,
        name: &str,
        version: &VersionPath,
        predecessor: Option<&VersionPath>,
    ) -> Result<(), HistoryError> {
        let element = self.element_mut(oid, name)?;
        let branch = version.branch();
        if element.branch(branch).is_some() {
            return Ok(());
        }
        let inconsistent = |detail: String| HistoryError::Inconsistent {
            element: name.to_string(),
            detail,
        };

        let Some(predecessor) = predecessor else {
            // only the first version of the root branch has no predecessor
            element.add_branch(branch.clone(), None)?;
            return Ok(());
        };
        if version.number() != 0 {
            return Err(inconsistent(format!(
                "branch {branch} is missing before version {version}"
            )));
        }
        let parent = version
            .parent_branch()
            .ok_or_else(|| inconsistent(format!("branch {branch} has no parent branch")))?;
        let point = BranchVersion::new(parent.clone(), predecessor.number());
        if element.version(&point).is_none() {
            return Err(inconsistent(format!(
                "branching point {point} of branch {branch} was not read"
            )));
        }
        element.add_branch(branch.clone(), Some(point))?;
        Ok(())
    }

    // =========================================================================
    // Shared
    // =========================================================================

    fn element_mut(&mut self, oid: &Oid, name: &str) -> Result<&mut Element, HistoryError> {
        self.graph
            .get_mut(oid)
            .ok_or_else(|| HistoryError::Inconsistent {
                element: name.to_string(),
                detail: format!("element {oid} vanished from the graph"),
            })
    }

    /// Query one version and append it to its (existing) branch unless it is
    /// after the cutoff.
    fn materialize(&mut self, oid: &Oid, name: &str, path: &VersionPath) -> Result<Materialized, HistoryError> {
        let versioned = ElementVersionPath::new(name, path.clone());
        let info = self.tool.version_metadata(&versioned)?;
        let at = path.local();

        if info.date > self.cutoff {
            self.diagnostics.record(Issue::FutureVersion {
                element: name.to_string(),
                oid: oid.clone(),
                version: at,
                date: info.date,
                cutoff: self.cutoff,
            });
            return Ok(Materialized::Future);
        }

        let key = VersionKey::new(oid.clone(), at.branch.clone(), at.number);
        let is_directory = self.element_mut(oid, name)?.is_directory();
        let entries = if is_directory {
            self.resolve_entries(oid, name, &key, &versioned)?
        } else {
            Vec::new()
        };

        let VersionInfo {
            author_name,
            author_login,
            date,
            comment,
            labels,
            merges_to,
            merges_from,
        } = info;
        let author = Author {
            name: author_name,
            login: author_login,
        };
        let mut version = if is_directory {
            Version::directory(at.number, author, date, comment)
        } else {
            Version::file(at.number, author, date, comment)
        };
        for label in labels {
            version.add_label(label);
        }

        self.element_mut(oid, name)?.push_version(&at.branch, version)?;
        let mut content = Vec::with_capacity(entries.len());
        for (entry, child) in entries {
            let child = match child {
                EntryChild::Known(child) => child,
                EntryChild::Symlink(link) => self.graph.get_or_insert(link).oid().clone(),
            };
            content.push((entry, child));
        }
        let element = self.element_mut(oid, name)?;
        for (entry, child) in content {
            element.set_content_entry(&at, entry, child)?;
        }

        let links = merges_to
            .into_iter()
            .map(|target| (MergeDirection::To, target))
            .chain(merges_from.into_iter().map(|source| (MergeDirection::From, source)));
        for (direction, target) in links {
            // merges along one branch carry no information
            if target.branch() != &at.branch {
                self.fixups.push_merge(MergeFixup {
                    version: key.clone(),
                    target: target.local(),
                    direction,
                });
            }
        }

        Ok(Materialized::Accepted(key))
    }

    /// Directory entries that can be attached now. Symbolic links become
    /// pseudo-elements; unknown oids are queued.
    fn resolve_entries(
        &mut self,
        oid: &Oid,
        name: &str,
        key: &VersionKey,
        versioned: &ElementVersionPath,
    ) -> Result<Vec<(String, EntryChild)>, HistoryError> {
        let mut entries = Vec::new();
        for (entry, target) in self.tool.list_directory(versioned)? {
            match target {
                DirEntryTarget::Element(child) if self.graph.contains(&child) => {
                    entries.push((entry, EntryChild::Known(child)));
                }
                DirEntryTarget::Element(child) => self.fixups.push_content(ContentFixup {
                    directory: key.clone(),
                    entry,
                    child,
                }),
                DirEntryTarget::Symlink(target) => {
                    let link = Element::symlink(oid, format!("{name}/{entry}"), target);
                    entries.push((entry, EntryChild::Symlink(link)));
                }
            }
        }
        Ok(entries)
    }
}

/// `\main\0` (or the first version of whatever the root branch is called).
fn is_first_version(version: &VersionPath) -> bool {
    version.number() == 0 && version.parent_branch().is_none()
}

/// Non-blank, trimmed lines of a list file.
fn read_list(path: &Path) -> Result<Vec<String>, HistoryError> {
    let text = fs::read_to_string(path).map_err(|source| HistoryError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::mock::{ScriptedTool, ToolCall};
    use chrono::TimeZone;

    fn at(second: u32) -> VersionInfo {
        VersionInfo {
            author_name: "Alice".into(),
            author_login: "alice".into(),
            date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, second).unwrap(),
            ..Default::default()
        }
    }

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
    }

    fn reader(tool: &ScriptedTool, cutoff: DateTime<Utc>) -> HistoryReader<ScriptedTool> {
        HistoryReader::new(tool.clone(), VersionGraph::new(), cutoff, Diagnostics::new())
    }

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    mod bulk {
        use super::*;

        #[test]
        fn branch_only_entries_are_skipped() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_tree_entry("a.c", r"\main");
            tool.add_version("a.c", r"\main\0", at(0));
            tool.add_tree_entry("a.c", r"\main\REL1");
            tool.add_version("a.c", r"\main\REL1\0", at(1));

            let mut reader = reader(&tool, far_future());
            assert_eq!(
                reader.read_element("a.c@@").unwrap(),
                ElementOutcome::Read { versions: 2 }
            );
            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert_eq!(element.name(), "a.c");
            assert_eq!(
                element.branch(&branch("REL1")).unwrap().branching_point(),
                Some(&BranchVersion::new(branch("main"), 0))
            );
        }

        #[test]
        fn unknown_and_repeated_elements() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(0));

            let mut reader = reader(&tool, far_future());
            assert_eq!(reader.read_element("nope.c").unwrap(), ElementOutcome::NotFound);
            reader.read_element("a.c").unwrap();
            tool.clear_calls();
            assert_eq!(
                reader.read_element("a.c").unwrap(),
                ElementOutcome::AlreadyPresent
            );
            assert_eq!(tool.calls(), vec![ToolCall::ObjectId("a.c".into())]);
            assert_eq!(reader.diagnostics().count("element-not-found"), 1);
            assert_eq!(reader.diagnostics().count("already-read"), 1);
            assert!(reader.diagnostics().issues().contains(&Issue::AlreadyRead {
                element: "a.c".into(),
                oid: Oid::new("f1").unwrap(),
            }));
        }

        #[test]
        fn missing_parent_branch_is_skipped() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(0));
            tool.add_tree_entry("a.c", r"\main\GHOST\DEV\0");
            tool.add_tree_entry("a.c", r"\main\GHOST\DEV\1");
            tool.add_version("a.c", r"\main\1", at(1));

            let mut reader = reader(&tool, far_future());
            assert_eq!(
                reader.read_element("a.c").unwrap(),
                ElementOutcome::Read { versions: 2 }
            );
            assert_eq!(reader.diagnostics().count("missing-parent-branch"), 1);
            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert!(element.branch(&branch("DEV")).is_none());
        }

        #[test]
        fn future_version_stops_the_element() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(0));
            tool.add_version("a.c", r"\main\1", at(30));
            tool.add_version("a.c", r"\main\REL1\0", at(31));

            let cutoff = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 10).unwrap();
            let mut reader = reader(&tool, cutoff);
            assert_eq!(
                reader.read_element("a.c").unwrap(),
                ElementOutcome::Read { versions: 1 }
            );
            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert_eq!(element.branches().count(), 1);
            assert_eq!(reader.diagnostics().count("future-version"), 1);
        }

        #[test]
        fn future_first_version_drops_the_branch() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(30));

            let cutoff = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 10).unwrap();
            let mut reader = reader(&tool, cutoff);
            reader.read_element("a.c").unwrap();
            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert!(!element.has_branches());
        }
    }

    mod directories {
        use super::*;

        #[test]
        fn rejected_version_leaves_no_symlink_elements() {
            let tool = ScriptedTool::new();
            tool.add_element("dir", "d1", true);
            tool.add_version("dir", r"\main\0", at(0));
            tool.set_directory(
                "dir",
                r"\main\0",
                [("link".to_string(), DirEntryTarget::Symlink("../target".into()))],
            );

            // the element exists but its branch was never opened
            let dir_oid = Oid::new("d1").unwrap();
            let mut graph = VersionGraph::new();
            graph.insert(Element::directory(dir_oid.clone(), "dir")).unwrap();
            let mut reader = HistoryReader::new(tool.clone(), graph, far_future(), Diagnostics::new());

            let result = reader.materialize(&dir_oid, "dir", &VersionPath::parse(r"\main\0").unwrap());
            assert!(matches!(result, Err(HistoryError::Model(_))));
            assert!(!reader.graph().contains(&Oid::symlink(&dir_oid, "../target")));
            assert_eq!(reader.graph().len(), 1);
        }

        #[test]
        fn entries_resolve_now_later_or_as_symlinks() {
            let tool = ScriptedTool::new();
            tool.add_element("dir", "d1", true);
            tool.add_element("dir/known.c", "f1", false);
            tool.add_element("dir/later.c", "f2", false);
            tool.add_version("dir/known.c", r"\main\0", at(0));
            tool.add_version("dir/later.c", r"\main\0", at(0));
            tool.add_version("dir", r"\main\0", at(1));
            tool.set_directory(
                "dir",
                r"\main\0",
                [
                    ("known.c".to_string(), DirEntryTarget::Element(Oid::new("f1").unwrap())),
                    ("later.c".to_string(), DirEntryTarget::Element(Oid::new("f2").unwrap())),
                    ("lost.c".to_string(), DirEntryTarget::Element(Oid::new("f3").unwrap())),
                    ("link".to_string(), DirEntryTarget::Symlink("../target".into())),
                    ("link2".to_string(), DirEntryTarget::Symlink("../target".into())),
                ],
            );

            let mut reader = reader(&tool, far_future());
            reader.read_element("dir/known.c").unwrap();
            reader.read_element("dir").unwrap();
            assert_eq!(reader.pending_fixups(), 2);
            reader.read_element("dir/later.c").unwrap();
            let summary = reader.resolve_fixups();
            assert_eq!(summary.content_resolved, 1);
            assert_eq!(summary.content_dropped, 1);

            let dir_oid = Oid::new("d1").unwrap();
            let version = reader
                .graph()
                .version(&VersionKey::new(dir_oid.clone(), branch("main"), 0))
                .unwrap();
            let content = version.content().unwrap();
            assert_eq!(content["known.c"], Oid::new("f1").unwrap());
            assert_eq!(content["later.c"], Oid::new("f2").unwrap());
            assert!(!content.contains_key("lost.c"));
            let link = Oid::symlink(&dir_oid, "../target");
            assert_eq!(content["link"], link);
            assert_eq!(content["link2"], link);

            let link_element = reader.graph().get(&link).unwrap();
            assert_eq!(link_element.symlink_target(), Some("../target"));
            assert!(reader.graph().validate().is_ok());
        }
    }

    mod point {
        use super::*;

        fn change_branch_tool() -> ScriptedTool {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(0));
            tool.add_version("a.c", r"\main\1", at(1));
            tool.add_version("a.c", r"\main\CHANGE\0", at(2));
            tool.add_version("a.c", r"\main\CHANGE\1", at(3));
            tool
        }

        fn evp(raw: &str) -> ElementVersionPath {
            ElementVersionPath::parse(raw).unwrap()
        }

        #[test]
        fn ancestors_are_read_oldest_first() {
            let tool = change_branch_tool();
            let mut reader = reader(&tool, far_future());
            let mut new_versions = Vec::new();
            assert_eq!(
                reader
                    .read_version(&evp(r"a.c@@\main\CHANGE\1"), &mut new_versions)
                    .unwrap(),
                VersionOutcome::Added
            );
            let order: Vec<String> = new_versions
                .iter()
                .map(|k| format!("{}/{}", k.branch, k.number))
                .collect();
            assert_eq!(order, vec!["main/0", "main/1", "CHANGE/0", "CHANGE/1"]);

            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert_eq!(
                element.branch(&branch("CHANGE")).unwrap().branching_point(),
                Some(&BranchVersion::new(branch("main"), 1))
            );
        }

        #[test]
        fn stops_at_versions_already_read() {
            let tool = change_branch_tool();
            let mut reader = reader(&tool, far_future());
            let mut new_versions = Vec::new();
            reader
                .read_version(&evp(r"a.c@@\main\1"), &mut new_versions)
                .unwrap();
            tool.clear_calls();
            new_versions.clear();

            reader
                .read_version(&evp(r"a.c@@\main\CHANGE\0"), &mut new_versions)
                .unwrap();
            assert_eq!(new_versions.len(), 1);
            let predecessor_calls = tool
                .calls()
                .into_iter()
                .filter(|c| matches!(c, ToolCall::Predecessor(_)))
                .count();
            assert_eq!(predecessor_calls, 1);
        }

        #[test]
        fn missing_predecessor_is_fatal() {
            let tool = change_branch_tool();
            tool.set_predecessor("a.c", r"\main\1", None);
            let mut reader = reader(&tool, far_future());
            let err = reader
                .read_version(&evp(r"a.c@@\main\1"), &mut Vec::new())
                .unwrap_err();
            assert!(matches!(err, HistoryError::Inconsistent { .. }));
        }

        #[test]
        fn future_ancestor_makes_descendants_future() {
            let tool = ScriptedTool::new();
            tool.add_element("a.c", "f1", false);
            tool.add_version("a.c", r"\main\0", at(0));
            tool.add_version("a.c", r"\main\1", at(40));
            tool.add_version("a.c", r"\main\2", at(50));

            let cutoff = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 10).unwrap();
            let mut reader = reader(&tool, cutoff);
            let mut new_versions = Vec::new();
            assert_eq!(
                reader
                    .read_version(&evp(r"a.c@@\main\2"), &mut new_versions)
                    .unwrap(),
                VersionOutcome::Future
            );
            assert_eq!(new_versions.len(), 1);
            let metadata_calls = tool
                .calls()
                .into_iter()
                .filter(|c| matches!(c, ToolCall::VersionMetadata(_)))
                .count();
            // main/2 is never queried once main/1 is rejected
            assert_eq!(metadata_calls, 2);
        }

        #[test]
        fn rename_is_recorded() {
            let tool = change_branch_tool();
            tool.add_element("renamed.c", "f1", false);
            tool.add_version("renamed.c", r"\main\0", at(0));
            let mut reader = reader(&tool, far_future());
            reader
                .read_version(&evp(r"a.c@@\main\0"), &mut Vec::new())
                .unwrap();
            assert_eq!(
                reader
                    .read_version(&evp(r"renamed.c@@\main\0"), &mut Vec::new())
                    .unwrap(),
                VersionOutcome::AlreadyPresent
            );
            let element = reader.graph().get(&Oid::new("f1").unwrap()).unwrap();
            assert_eq!(element.name(), "renamed.c");
            assert_eq!(reader.diagnostics().count("renamed"), 1);
        }

        #[test]
        fn unparsable_lines_are_recorded() {
            let tool = ScriptedTool::new();
            let mut reader = reader(&tool, far_future());
            assert_eq!(
                reader
                    .read_version_line("not a version", &mut Vec::new())
                    .unwrap(),
                VersionOutcome::Unparsable
            );
            assert!(tool.calls().is_empty());
            assert_eq!(reader.diagnostics().count("unparsable-version"), 1);
        }
    }

    #[test]
    fn read_lists_in_order() {
        let temp = tempfile::TempDir::new().unwrap();
        let files = temp.path().join("files.txt");
        let versions = temp.path().join("versions.txt");
        fs::write(&files, "a.c\n\n   \nmissing.c\n").unwrap();
        fs::write(&versions, "b.c@@\\main\\0\n").unwrap();

        let tool = ScriptedTool::new();
        tool.add_element("a.c", "f1", false);
        tool.add_version("a.c", r"\main\0", at(0));
        tool.add_element("b.c", "f2", false);
        tool.add_version("b.c", r"\main\0", at(0));

        let mut reader = reader(&tool, far_future());
        let summary = reader
            .read(&ReadRequest {
                elements_file: Some(files),
                directories_file: None,
                versions_file: Some(versions),
            })
            .unwrap();
        assert_eq!(summary.files_read, 2);
        assert_eq!(summary.versions_requested, 1);
        assert_eq!(summary.new_versions.unwrap().len(), 1);
        assert_eq!(reader.graph().len(), 2);
    }

    #[test]
    fn zero_progress_intervals_still_read_every_list() {
        let temp = tempfile::TempDir::new().unwrap();
        let files = temp.path().join("files.txt");
        let directories = temp.path().join("directories.txt");
        let versions = temp.path().join("versions.txt");
        fs::write(&files, "a.c\n").unwrap();
        fs::write(&directories, "src\n").unwrap();
        fs::write(&versions, "b.c@@\\main\\0\nb.c@@\\main\\1\n").unwrap();

        let tool = ScriptedTool::new();
        tool.add_element("a.c", "f1", false);
        tool.add_version("a.c", r"\main\0", at(0));
        tool.add_element("src", "d1", true);
        tool.add_version("src", r"\main\0", at(0));
        tool.add_element("b.c", "f2", false);
        tool.add_version("b.c", r"\main\0", at(0));
        tool.add_version("b.c", r"\main\1", at(1));

        let mut reader = reader(&tool, far_future()).with_progress(ProgressIntervals {
            files: 0,
            directories: 0,
            versions: 0,
        });
        let summary = reader
            .read(&ReadRequest {
                elements_file: Some(files),
                directories_file: Some(directories),
                versions_file: Some(versions),
            })
            .unwrap();
        assert_eq!(summary.files_read, 1);
        assert_eq!(summary.directories_read, 1);
        assert_eq!(summary.versions_requested, 2);
        assert_eq!(summary.new_versions.unwrap().len(), 2);
        assert_eq!(reader.graph().len(), 3);
    }

    #[test]
    fn missing_list_file_is_an_input_error() {
        let tool = ScriptedTool::new();
        let mut reader = reader(&tool, far_future());
        let err = reader
            .read(&ReadRequest {
                elements_file: Some(PathBuf::from("/definitely/not/here.txt")),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, HistoryError::Input { .. }));
    }
}
