//! core::snapshot::schema
//!
//! Flat, cycle-free persisted form of the version graph.
//!
//! # Schema Design
//!
//! - Self-describing with `kind` and `schema_version`
//! - Every cross reference is a value: a [`VersionKey`] triple
//!   (element oid, branch, number) or a bare oid
//! - A SHA-256 `fingerprint` over the element list detects truncated or
//!   hand-edited files
//!
//! Restoring rebuilds the oid table first and then checks every reference
//! against it in one pass ([`VersionGraph::validate`]).
//!
//! # Example
//!
//! ```
//! use vobgraph::core::model::{Element, VersionGraph};
//! use vobgraph::core::snapshot::schema::{flatten, parse_snapshot, restore};
//! use vobgraph::core::types::Oid;
//!
//! let mut graph = VersionGraph::new();
//! graph.insert(Element::file(Oid::new("40a1").unwrap(), "a.txt")).unwrap();
//!
//! let json = serde_json::to_string(&flatten(&graph).unwrap()).unwrap();
//! let restored = restore(parse_snapshot(&json).unwrap()).unwrap();
//! assert_eq!(restored, graph);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::model::{Author, Branch, Element, ElementKind, ModelError, Version, VersionGraph};
use crate::core::types::{BranchName, BranchVersion, Oid, VersionKey};

/// The kind identifier for snapshot files.
pub const SNAPSHOT_KIND: &str = "vobgraph.snapshot";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from snapshot encoding and decoding.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse snapshot: {0}")]
    ParseError(String),

    #[error("failed to serialize snapshot: {0}")]
    SerializeError(String),

    #[error("invalid kind '{found}', expected '{}'", SNAPSHOT_KIND)]
    InvalidKind { found: String },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    #[error("fingerprint mismatch: header says {expected}, content hashes to {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("invalid reference: {0}")]
    Reference(#[from] ModelError),
}

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    kind: String,
    schema_version: u32,
}

/// Snapshot file contents (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotV1 {
    pub kind: String,
    pub schema_version: u32,
    pub fingerprint: String,
    pub elements: Vec<ElementRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ElementRecord {
    pub oid: Oid,
    pub name: String,
    pub kind: KindRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindRecord {
    File,
    Directory,
    Symlink { directory: Oid, target: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BranchRecord {
    pub name: BranchName,
    pub branching_point: Option<VersionKey>,
    pub versions: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VersionRecord {
    pub number: u32,
    pub author_name: String,
    pub author_login: String,
    pub date: DateTime<Utc>,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merges_from: Vec<VersionKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merges_to: Vec<VersionKey>,
    /// Present for directory versions, possibly empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentRecord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContentRecord {
    pub name: String,
    pub oid: Oid,
}

/// Hash of the element list as it is serialized.
pub fn fingerprint(elements: &[ElementRecord]) -> Result<String, SchemaError> {
    let bytes =
        serde_json::to_vec(elements).map_err(|e| SchemaError::SerializeError(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Flatten a live graph into its persisted form.
pub fn flatten(graph: &VersionGraph) -> Result<SnapshotV1, SchemaError> {
    let elements: Vec<ElementRecord> = graph.elements().map(flatten_element).collect();
    Ok(SnapshotV1 {
        kind: SNAPSHOT_KIND.to_string(),
        schema_version: SCHEMA_VERSION,
        fingerprint: fingerprint(&elements)?,
        elements,
    })
}

fn flatten_element(element: &Element) -> ElementRecord {
    let oid = element.oid();
    let key = |local: &BranchVersion| {
        VersionKey::new(oid.clone(), local.branch.clone(), local.number)
    };
    ElementRecord {
        oid: oid.clone(),
        name: element.name().to_string(),
        kind: match element.kind() {
            ElementKind::File => KindRecord::File,
            ElementKind::Directory => KindRecord::Directory,
            ElementKind::Symlink { directory, target } => KindRecord::Symlink {
                directory: directory.clone(),
                target: target.clone(),
            },
        },
        branches: element
            .branches()
            .map(|branch| BranchRecord {
                name: branch.name().clone(),
                branching_point: branch.branching_point().map(key),
                versions: branch
                    .versions()
                    .iter()
                    .map(|version| VersionRecord {
                        number: version.number(),
                        author_name: version.author().name.clone(),
                        author_login: version.author().login.clone(),
                        date: version.date(),
                        comment: version.comment().to_string(),
                        labels: version.labels().to_vec(),
                        merges_from: version.merges_from().iter().map(key).collect(),
                        merges_to: version.merges_to().iter().map(key).collect(),
                        content: version.content().map(|content| {
                            content
                                .iter()
                                .map(|(name, oid)| ContentRecord {
                                    name: name.clone(),
                                    oid: oid.clone(),
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Parse snapshot JSON with version dispatch and fingerprint check.
pub fn parse_snapshot(json: &str) -> Result<SnapshotV1, SchemaError> {
    let envelope: SnapshotEnvelope =
        serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))?;

    if envelope.kind != SNAPSHOT_KIND {
        return Err(SchemaError::InvalidKind {
            found: envelope.kind,
        });
    }

    match envelope.schema_version {
        1 => {
            let snapshot: SnapshotV1 =
                serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))?;
            let actual = fingerprint(&snapshot.elements)?;
            if actual != snapshot.fingerprint {
                return Err(SchemaError::FingerprintMismatch {
                    expected: snapshot.fingerprint,
                    actual,
                });
            }
            Ok(snapshot)
        }
        v => Err(SchemaError::UnsupportedVersion(v)),
    }
}

/// Rebuild the live graph and resolve every reference against it.
pub fn restore(snapshot: SnapshotV1) -> Result<VersionGraph, SchemaError> {
    let elements = snapshot
        .elements
        .into_iter()
        .map(restore_element)
        .collect::<Result<Vec<_>, _>>()?;
    let graph = VersionGraph::from_elements(elements)?;
    graph.validate()?;
    Ok(graph)
}

fn restore_element(record: ElementRecord) -> Result<Element, SchemaError> {
    let owner = record.oid;
    // Triples must point back into the owning element.
    let local = |key: VersionKey| -> Result<BranchVersion, ModelError> {
        if key.element != owner {
            return Err(ModelError::DanglingReference {
                element: owner.clone(),
                reference: format!("cross-element link {key}"),
            });
        }
        Ok(key.local())
    };

    let mut branches = Vec::with_capacity(record.branches.len());
    for branch in record.branches {
        let branching_point = branch.branching_point.map(&local).transpose()?;
        let mut versions = Vec::with_capacity(branch.versions.len());
        for v in branch.versions {
            let merges_from = v.merges_from.into_iter().map(&local).collect::<Result<_, _>>()?;
            let merges_to = v.merges_to.into_iter().map(&local).collect::<Result<_, _>>()?;
            let content = v.content.map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| (entry.name, entry.oid))
                    .collect::<BTreeMap<_, _>>()
            });
            versions.push(Version::restore(
                v.number,
                Author {
                    name: v.author_name,
                    login: v.author_login,
                },
                v.date,
                v.comment,
                v.labels,
                merges_from,
                merges_to,
                content,
            ));
        }
        branches.push(Branch::restore(branch.name, branching_point, versions));
    }

    let kind = match record.kind {
        KindRecord::File => ElementKind::File,
        KindRecord::Directory => ElementKind::Directory,
        KindRecord::Symlink { directory, target } => ElementKind::Symlink { directory, target },
    };
    Ok(Element::restore(owner.clone(), record.name, kind, branches))
}
