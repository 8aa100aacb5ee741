//! history::fixup
//!
//! Deferred references found during discovery.
//!
//! A directory version may list a child that has not been read yet, and a
//! version may name a merge partner on a branch that does not exist yet.
//! Both are queued as keys and resolved once, after every requested element
//! and version has been read. Whatever is still missing then is dropped with
//! an issue.

use crate::core::model::{MergeDirection, ModelError, VersionGraph};
use crate::core::types::{BranchVersion, Oid, VersionKey};

use super::report::{Diagnostics, Issue};

/// Directory entry whose child element was unknown when listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFixup {
    pub directory: VersionKey,
    pub entry: String,
    pub child: Oid,
}

/// Merge link to a version on another branch of the same element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFixup {
    pub version: VersionKey,
    pub target: BranchVersion,
    pub direction: MergeDirection,
}

/// Outcome counts of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FixupSummary {
    pub content_resolved: usize,
    pub content_dropped: usize,
    pub merges_resolved: usize,
    pub merges_dropped: usize,
}

/// Pending fixups, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct FixupQueue {
    content: Vec<ContentFixup>,
    merges: Vec<MergeFixup>,
}

impl FixupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_content(&mut self, fixup: ContentFixup) {
        self.content.push(fixup);
    }

    pub fn push_merge(&mut self, fixup: MergeFixup) {
        self.merges.push(fixup);
    }

    pub fn len(&self) -> usize {
        self.content.len() + self.merges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.merges.is_empty()
    }

    /// Resolve and empty the queue.
    pub fn resolve(&mut self, graph: &mut VersionGraph, diagnostics: &mut Diagnostics) -> FixupSummary {
        let mut summary = FixupSummary::default();

        for fixup in std::mem::take(&mut self.content) {
            match resolve_content(graph, &fixup) {
                Ok(()) => summary.content_resolved += 1,
                Err(reason) => {
                    tracing::debug!(%reason, "content fixup dropped");
                    summary.content_dropped += 1;
                    diagnostics.record(Issue::UnresolvedContent {
                        directory: fixup.directory,
                        entry: fixup.entry,
                        child: fixup.child,
                    });
                }
            }
        }

        for fixup in std::mem::take(&mut self.merges) {
            match resolve_merge(graph, &fixup) {
                Ok(()) => summary.merges_resolved += 1,
                Err(reason) => {
                    tracing::debug!(%reason, "merge fixup dropped");
                    summary.merges_dropped += 1;
                    diagnostics.record(Issue::UnresolvedMerge {
                        version: fixup.version,
                        target: fixup.target,
                        direction: fixup.direction,
                    });
                }
            }
        }

        tracing::info!(
            content_resolved = summary.content_resolved,
            content_dropped = summary.content_dropped,
            merges_resolved = summary.merges_resolved,
            merges_dropped = summary.merges_dropped,
            "fixups resolved"
        );
        summary
    }
}

fn missing(element: &Oid, reference: &str) -> ModelError {
    ModelError::DanglingReference {
        element: element.clone(),
        reference: reference.to_string(),
    }
}

fn resolve_content(graph: &mut VersionGraph, fixup: &ContentFixup) -> Result<(), ModelError> {
    let directory = &fixup.directory.element;
    if !graph.contains(&fixup.child) {
        return Err(missing(directory, &format!("child {}", fixup.child)));
    }
    graph
        .get_mut(directory)
        .ok_or_else(|| missing(directory, "directory element"))?
        .set_content_entry(&fixup.directory.local(), fixup.entry.clone(), fixup.child.clone())
        .map(|_| ())
}

fn resolve_merge(graph: &mut VersionGraph, fixup: &MergeFixup) -> Result<(), ModelError> {
    let element = &fixup.version.element;
    graph
        .get_mut(element)
        .ok_or_else(|| missing(element, "element"))?
        .add_merge(&fixup.version.local(), fixup.direction, fixup.target.clone())
        .map(|_| ())
}
