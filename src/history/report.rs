//! history::report
//!
//! Explicit collector for recoverable problems found while reading history.
//!
//! # Architecture
//!
//! A [`Diagnostics`] value is handed to the reader at construction and
//! returned with the finished graph. Recording an [`Issue`] both stores it
//! and emits the matching `tracing` event, so nothing depends on a global
//! logger and callers can still inspect every skip or drop afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::model::MergeDirection;
use crate::core::types::{BranchName, BranchVersion, Oid, VersionKey};

/// How much an issue matters for the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected during normal operation.
    Info,
    /// Data was skipped or dropped.
    Warning,
}

/// A recoverable problem, with enough identity for a manual re-import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Issue {
    #[error("could not find oid for element {element}")]
    ElementNotFound { element: String },

    #[error("skipping element {element} ({oid}): already read")]
    AlreadyRead { element: String, oid: Oid },

    #[error("could not parse '{line}' as a version")]
    UnparsableVersion { line: String },

    #[error("skipping version {version} of {element} ({oid}): {date} is after {cutoff}")]
    FutureVersion {
        element: String,
        oid: Oid,
        version: BranchVersion,
        date: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    },

    #[error("skipping branch {branch} of {element} ({oid}): parent branch {} not read", .parent.as_ref().map_or("<none>", BranchName::as_str))]
    MissingParentBranch {
        element: String,
        oid: Oid,
        branch: BranchName,
        parent: Option<BranchName>,
    },

    #[error("element {oid} is now named {to} instead of {from}")]
    Renamed { oid: Oid, from: String, to: String },

    #[error("element {child} referenced as {entry} in {directory} was not imported")]
    UnresolvedContent {
        directory: VersionKey,
        entry: String,
        child: Oid,
    },

    #[error("version {target} of {}, linked {direction:?} from {}/{}, was not imported", .version.element, .version.branch, .version.number)]
    UnresolvedMerge {
        version: VersionKey,
        target: BranchVersion,
        direction: MergeDirection,
    },
}

impl Issue {
    /// Stable short name, used to group issues in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Issue::ElementNotFound { .. } => "element-not-found",
            Issue::AlreadyRead { .. } => "already-read",
            Issue::UnparsableVersion { .. } => "unparsable-version",
            Issue::FutureVersion { .. } => "future-version",
            Issue::MissingParentBranch { .. } => "missing-parent-branch",
            Issue::Renamed { .. } => "renamed",
            Issue::UnresolvedContent { .. } => "unresolved-content",
            Issue::UnresolvedMerge { .. } => "unresolved-merge",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Issue::FutureVersion { .. } | Issue::Renamed { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

/// Collected issues of one reader run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an issue and log it.
    pub fn record(&mut self, issue: Issue) {
        let kind = issue.kind();
        match issue.severity() {
            Severity::Info => tracing::info!(kind, "{issue}"),
            Severity::Warning => tracing::warn!(kind, "{issue}"),
        }
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of issues of one kind.
    pub fn count(&self, kind: &str) -> usize {
        self.issues.iter().filter(|i| i.kind() == kind).count()
    }

    /// Issue counts by kind.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Append the issues of another collector.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }
}
