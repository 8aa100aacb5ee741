//! core::model
//!
//! The version graph: elements, branches, versions, merge links and
//! directory contents.
//!
//! # Architecture
//!
//! The graph is an oid-indexed table. Nothing holds a pointer to anything
//! else:
//! - a branching point is a [`BranchVersion`] on the same element
//! - a merge link is a [`BranchVersion`] on the same element
//! - a directory entry is the [`Oid`] of the child element
//!
//! Live lookups go through [`VersionGraph`] / [`Element`], which keeps the
//! cyclic shape of the history (element, branch, version, merge) out of the
//! ownership graph.
//!
//! # Invariants
//!
//! - Version numbers strictly increase within a branch
//! - At most one branch per element has no branching point (the root)
//! - A branching point exists on its parent branch when the branch is added
//! - Merge links always cross branches and point at existing versions
//! - Only directory versions carry content

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{BranchName, BranchVersion, Oid, VersionKey};

/// Errors from graph mutations and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("element {0} already exists")]
    DuplicateElement(Oid),

    #[error("element {element} already has branch {branch}")]
    BranchExists { element: Oid, branch: BranchName },

    #[error("element {element} already has a root branch, cannot add {branch} without a branching point")]
    SecondRoot { element: Oid, branch: BranchName },

    #[error("branching point {point} of {element}/{branch} does not exist")]
    MissingBranchingPoint {
        element: Oid,
        branch: BranchName,
        point: BranchVersion,
    },

    #[error("version {number} does not follow {last} on {element}/{branch}")]
    NonMonotonic {
        element: Oid,
        branch: BranchName,
        last: u32,
        number: u32,
    },

    #[error("version {version} of {element} does not exist")]
    UnknownVersion { element: Oid, version: BranchVersion },

    #[error("version {version} of {element} is not a directory version")]
    NotADirectory { element: Oid, version: BranchVersion },

    #[error("{element} references missing {reference}")]
    DanglingReference { element: Oid, reference: String },
}

/// What kind of filesystem object an element is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    File,
    Directory,
    /// Pseudo-element for a symbolic link: no history, just a target.
    Symlink {
        /// Directory element the link was listed in.
        directory: Oid,
        target: String,
    },
}

/// Direction of a merge link, seen from the version that records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeDirection {
    /// This version was merged into the linked one.
    To,
    /// The linked version was merged into this one.
    From,
}

/// Who created a version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    pub name: String,
    pub login: String,
}

/// One immutable revision of an element on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    number: u32,
    author: Author,
    date: DateTime<Utc>,
    comment: String,
    labels: Vec<String>,
    merges_from: Vec<BranchVersion>,
    merges_to: Vec<BranchVersion>,
    /// `Some` for directory versions: entry name to child element.
    content: Option<BTreeMap<String, Oid>>,
}

impl Version {
    /// A file version with no labels, merges or content.
    pub fn file(number: u32, author: Author, date: DateTime<Utc>, comment: impl Into<String>) -> Self {
        Self {
            number,
            author,
            date,
            comment: comment.into(),
            labels: Vec::new(),
            merges_from: Vec::new(),
            merges_to: Vec::new(),
            content: None,
        }
    }

    /// A directory version with empty content.
    pub fn directory(
        number: u32,
        author: Author,
        date: DateTime<Utc>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            content: Some(BTreeMap::new()),
            ..Self::file(number, author, date, comment)
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Add a label. Returns false if it was already present.
    pub fn add_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.labels.contains(&label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    pub fn merges(&self, direction: MergeDirection) -> &[BranchVersion] {
        match direction {
            MergeDirection::To => &self.merges_to,
            MergeDirection::From => &self.merges_from,
        }
    }

    pub fn merges_to(&self) -> &[BranchVersion] {
        &self.merges_to
    }

    pub fn merges_from(&self) -> &[BranchVersion] {
        &self.merges_from
    }

    pub fn is_directory(&self) -> bool {
        self.content.is_some()
    }

    /// Directory content, `None` for file versions.
    pub fn content(&self) -> Option<&BTreeMap<String, Oid>> {
        self.content.as_ref()
    }

    fn merges_mut(&mut self, direction: MergeDirection) -> &mut Vec<BranchVersion> {
        match direction {
            MergeDirection::To => &mut self.merges_to,
            MergeDirection::From => &mut self.merges_from,
        }
    }

    /// Rebuild a version from persisted parts. References are checked by
    /// [`VersionGraph::validate`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        number: u32,
        author: Author,
        date: DateTime<Utc>,
        comment: String,
        labels: Vec<String>,
        merges_from: Vec<BranchVersion>,
        merges_to: Vec<BranchVersion>,
        content: Option<BTreeMap<String, Oid>>,
    ) -> Self {
        Self {
            number,
            author,
            date,
            comment,
            labels,
            merges_from,
            merges_to,
            content,
        }
    }
}

/// A named, linear sequence of versions of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    name: BranchName,
    branching_point: Option<BranchVersion>,
    versions: Vec<Version>,
}

impl Branch {
    pub fn name(&self) -> &BranchName {
        &self.name
    }

    /// Version on the parent branch this branch forked from; `None` for the root.
    pub fn branching_point(&self) -> Option<&BranchVersion> {
        self.branching_point.as_ref()
    }

    pub fn parent_branch(&self) -> Option<&BranchName> {
        self.branching_point.as_ref().map(|p| &p.branch)
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    pub fn version(&self, number: u32) -> Option<&Version> {
        self.versions
            .binary_search_by_key(&number, Version::number)
            .ok()
            .map(|i| &self.versions[i])
    }

    fn version_mut(&mut self, number: u32) -> Option<&mut Version> {
        self.versions
            .binary_search_by_key(&number, Version::number)
            .ok()
            .map(|i| &mut self.versions[i])
    }

    pub(crate) fn restore(
        name: BranchName,
        branching_point: Option<BranchVersion>,
        versions: Vec<Version>,
    ) -> Self {
        Self {
            name,
            branching_point,
            versions,
        }
    }
}

/// One versioned filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    oid: Oid,
    name: String,
    kind: ElementKind,
    branches: BTreeMap<BranchName, Branch>,
}

impl Element {
    pub fn new(oid: Oid, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            oid,
            name: name.into(),
            kind,
            branches: BTreeMap::new(),
        }
    }

    pub fn file(oid: Oid, name: impl Into<String>) -> Self {
        Self::new(oid, name, ElementKind::File)
    }

    pub fn directory(oid: Oid, name: impl Into<String>) -> Self {
        Self::new(oid, name, ElementKind::Directory)
    }

    /// Pseudo-element for a link listed in `directory`, keyed by [`Oid::symlink`].
    pub fn symlink(directory: &Oid, name: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self::new(
            Oid::symlink(directory, &target),
            name,
            ElementKind::Symlink {
                directory: directory.clone(),
                target,
            },
        )
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the display name, returning the previous one if it changed.
    pub fn rename(&mut self, name: impl Into<String>) -> Option<String> {
        let name = name.into();
        if name == self.name {
            return None;
        }
        Some(std::mem::replace(&mut self.name, name))
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ElementKind::Directory
    }

    pub fn symlink_target(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Symlink { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    pub fn branch(&self, name: &BranchName) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn has_branches(&self) -> bool {
        !self.branches.is_empty()
    }

    /// Create a branch.
    ///
    /// `branching_point` may only be `None` for the first root branch; when
    /// present it must name an existing version on the parent branch.
    pub fn add_branch(
        &mut self,
        name: BranchName,
        branching_point: Option<BranchVersion>,
    ) -> Result<&mut Branch, ModelError> {
        if self.branches.contains_key(&name) {
            return Err(ModelError::BranchExists {
                element: self.oid.clone(),
                branch: name,
            });
        }
        match &branching_point {
            None if self.branches.values().any(|b| b.branching_point.is_none()) => {
                return Err(ModelError::SecondRoot {
                    element: self.oid.clone(),
                    branch: name,
                });
            }
            Some(point) if self.version(point).is_none() => {
                return Err(ModelError::MissingBranchingPoint {
                    element: self.oid.clone(),
                    branch: name,
                    point: point.clone(),
                });
            }
            _ => {}
        }
        Ok(self
            .branches
            .entry(name.clone())
            .or_insert_with(|| Branch::restore(name, branching_point, Vec::new())))
    }

    /// Remove a branch if it holds no version. Returns true if removed.
    pub fn remove_branch_if_empty(&mut self, name: &BranchName) -> bool {
        match self.branches.entry(name.clone()) {
            Entry::Occupied(entry) if entry.get().is_empty() => {
                entry.remove();
                true
            }
            _ => false,
        }
    }

    /// Append a version to a branch, enforcing strictly increasing numbers.
    pub fn push_version(&mut self, branch: &BranchName, version: Version) -> Result<(), ModelError> {
        let oid = self.oid.clone();
        let target = self
            .branches
            .get_mut(branch)
            .ok_or_else(|| ModelError::UnknownVersion {
                element: oid.clone(),
                version: BranchVersion::new(branch.clone(), version.number),
            })?;
        if let Some(last) = target.latest() {
            if last.number >= version.number {
                return Err(ModelError::NonMonotonic {
                    element: oid,
                    branch: branch.clone(),
                    last: last.number,
                    number: version.number,
                });
            }
        }
        target.versions.push(version);
        Ok(())
    }

    pub fn version(&self, at: &BranchVersion) -> Option<&Version> {
        self.branches.get(&at.branch)?.version(at.number)
    }

    fn version_mut(&mut self, at: &BranchVersion) -> Result<&mut Version, ModelError> {
        let oid = self.oid.clone();
        self.branches
            .get_mut(&at.branch)
            .and_then(|b| b.version_mut(at.number))
            .ok_or_else(|| ModelError::UnknownVersion {
                element: oid,
                version: at.clone(),
            })
    }

    /// Latest version currently on `branch`.
    pub fn latest(&self, branch: &BranchName) -> Option<&Version> {
        self.branches.get(branch)?.latest()
    }

    /// Record a merge link from the version at `at` to `target`.
    ///
    /// Returns `Ok(false)` when the link stays on one branch or is already
    /// recorded; both versions must exist.
    pub fn add_merge(
        &mut self,
        at: &BranchVersion,
        direction: MergeDirection,
        target: BranchVersion,
    ) -> Result<bool, ModelError> {
        if at.branch == target.branch {
            return Ok(false);
        }
        if self.version(&target).is_none() {
            return Err(ModelError::UnknownVersion {
                element: self.oid.clone(),
                version: target,
            });
        }
        let links = self.version_mut(at)?.merges_mut(direction);
        if links.contains(&target) {
            return Ok(false);
        }
        links.push(target);
        Ok(true)
    }

    /// Record or replace a directory entry. Returns the previous child oid.
    pub fn set_content_entry(
        &mut self,
        at: &BranchVersion,
        name: impl Into<String>,
        child: Oid,
    ) -> Result<Option<Oid>, ModelError> {
        let oid = self.oid.clone();
        let version = self.version_mut(at)?;
        match version.content.as_mut() {
            Some(content) => Ok(content.insert(name.into(), child)),
            None => Err(ModelError::NotADirectory {
                element: oid,
                version: at.clone(),
            }),
        }
    }

    pub(crate) fn restore(
        oid: Oid,
        name: String,
        kind: ElementKind,
        branches: Vec<Branch>,
    ) -> Self {
        Self {
            oid,
            name,
            kind,
            branches: branches.into_iter().map(|b| (b.name.clone(), b)).collect(),
        }
    }
}

/// Counts over a graph, used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub elements: usize,
    pub symlinks: usize,
    pub branches: usize,
    pub versions: usize,
    pub merge_links: usize,
    pub directory_entries: usize,
}

/// Outcome of [`VersionGraph::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Elements only present in the merged-in graph.
    pub added: usize,
    /// Elements present on both sides (kept from `self`).
    pub kept: usize,
    /// Oids whose names disagreed: (oid, kept name, ignored name).
    pub name_conflicts: Vec<(Oid, String, String)>,
}

/// The whole reconstructed history, keyed by oid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionGraph {
    elements: BTreeMap<Oid, Element>,
}

impl VersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.elements.contains_key(oid)
    }

    pub fn get(&self, oid: &Oid) -> Option<&Element> {
        self.elements.get(oid)
    }

    pub fn get_mut(&mut self, oid: &Oid) -> Option<&mut Element> {
        self.elements.get_mut(oid)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn insert(&mut self, element: Element) -> Result<&mut Element, ModelError> {
        match self.elements.entry(element.oid.clone()) {
            Entry::Occupied(_) => Err(ModelError::DuplicateElement(element.oid)),
            Entry::Vacant(slot) => Ok(slot.insert(element)),
        }
    }

    /// Existing element for `element.oid()`, or insert `element`.
    pub fn get_or_insert(&mut self, element: Element) -> &mut Element {
        self.elements.entry(element.oid.clone()).or_insert(element)
    }

    pub fn version(&self, key: &VersionKey) -> Option<&Version> {
        self.elements.get(&key.element)?.version(&key.local())
    }

    /// Merge another graph into this one.
    ///
    /// Oids only present in `other` are added as they are. On a collision
    /// the element of `self` is kept unchanged; a differing name is reported
    /// but not adopted.
    pub fn merge(&mut self, other: VersionGraph) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for (oid, element) in other.elements {
            match self.elements.entry(oid) {
                Entry::Vacant(slot) => {
                    slot.insert(element);
                    summary.added += 1;
                }
                Entry::Occupied(existing) => {
                    summary.kept += 1;
                    if existing.get().name != element.name {
                        tracing::warn!(
                            oid = %existing.key(),
                            kept = %existing.get().name,
                            ignored = %element.name,
                            "element has a different name in merged snapshot"
                        );
                        summary.name_conflicts.push((
                            existing.key().clone(),
                            existing.get().name.clone(),
                            element.name,
                        ));
                    }
                }
            }
        }
        summary
    }

    /// Check every stored reference against the graph.
    ///
    /// Used after loading a snapshot; discovery maintains these through the
    /// mutators above.
    pub fn validate(&self) -> Result<(), ModelError> {
        for element in self.elements.values() {
            let dangling = |reference: String| ModelError::DanglingReference {
                element: element.oid.clone(),
                reference,
            };

            if let ElementKind::Symlink { directory, .. } = &element.kind {
                if !self.elements.contains_key(directory) {
                    return Err(dangling(format!("symlink directory {directory}")));
                }
            }

            let roots = element
                .branches
                .values()
                .filter(|b| b.branching_point.is_none())
                .count();
            if roots > 1 {
                return Err(dangling("second root branch".to_string()));
            }

            for branch in element.branches.values() {
                if let Some(point) = &branch.branching_point {
                    if element.version(point).is_none() {
                        return Err(dangling(format!(
                            "branching point {point} of branch {}",
                            branch.name
                        )));
                    }
                }
                for pair in branch.versions.windows(2) {
                    if pair[0].number >= pair[1].number {
                        return Err(ModelError::NonMonotonic {
                            element: element.oid.clone(),
                            branch: branch.name.clone(),
                            last: pair[0].number,
                            number: pair[1].number,
                        });
                    }
                }
                for version in &branch.versions {
                    for link in version.merges_to.iter().chain(&version.merges_from) {
                        if element.version(link).is_none() {
                            return Err(dangling(format!("merge link {link}")));
                        }
                    }
                    for (name, child) in version.content.iter().flatten() {
                        if !self.elements.contains_key(child) {
                            return Err(dangling(format!("directory entry {name} -> {child}")));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            elements: self.elements.len(),
            ..GraphStats::default()
        };
        for element in self.elements.values() {
            if matches!(element.kind, ElementKind::Symlink { .. }) {
                stats.symlinks += 1;
            }
            for branch in element.branches.values() {
                stats.branches += 1;
                stats.versions += branch.versions.len();
                for version in &branch.versions {
                    stats.merge_links += version.merges_to.len() + version.merges_from.len();
                    stats.directory_entries += version.content.as_ref().map_or(0, BTreeMap::len);
                }
            }
        }
        stats
    }

    pub(crate) fn from_elements(elements: impl IntoIterator<Item = Element>) -> Result<Self, ModelError> {
        let mut graph = Self::new();
        for element in elements {
            graph.insert(element)?;
        }
        Ok(graph)
    }

    pub(crate) fn into_elements(self) -> impl Iterator<Item = Element> {
        self.elements.into_values()
    }
}
