//! core::snapshot::store
//!
//! Snapshot files on disk.
//!
//! # Architecture
//!
//! A [`SnapshotStore`] owns one snapshot path. Saving:
//! 1. takes an exclusive `fs2` lock on `<path>.lock` (fails fast if held)
//! 2. writes `<path>.tmp` and fsyncs it
//! 3. optionally moves the previous file to `<path>.bak`
//! 4. renames the temp file over `<path>`
//!
//! Loading parses, checks the fingerprint and resolves references
//! (see [`super::schema`]). Several snapshots captured by separate runs are
//! combined with [`load_all`], where the first file wins on oid collisions.
//!
//! # Example
//!
//! ```no_run
//! use vobgraph::core::model::VersionGraph;
//! use vobgraph::core::snapshot::SnapshotStore;
//!
//! let store = SnapshotStore::new("vob.snapshot.json").with_backup(true);
//! store.save(&VersionGraph::new())?;
//! let graph = store.load()?;
//! assert!(graph.is_empty());
//! # Ok::<(), vobgraph::core::snapshot::SnapshotError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use super::schema::{flatten, parse_snapshot, restore, SchemaError};
use crate::core::model::{MergeSummary, VersionGraph};

/// Errors from snapshot storage operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read snapshot '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write snapshot '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot '{0}' is locked by another process")]
    Locked(PathBuf),

    #[error("invalid snapshot '{path}': {source}")]
    Invalid { path: PathBuf, source: SchemaError },
}

/// Exclusive writer lock, released on drop.
struct SnapshotLock {
    file: File,
}

impl SnapshotLock {
    fn acquire(target: &Path) -> Result<Self, SnapshotError> {
        let path = sibling(target, "lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| SnapshotError::WriteError {
                path: path.clone(),
                source,
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(SnapshotError::Locked(target.to_path_buf()))
            }
            Err(source) => Err(SnapshotError::WriteError { path, source }),
        }
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// `<path>.<ext>` next to `path`.
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// One snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    keep_backup: bool,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: false,
        }
    }

    /// Keep the previous file as `<path>.bak` when saving over it.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load and restore the snapshot.
    pub fn load(&self) -> Result<VersionGraph, SnapshotError> {
        if !self.path.exists() {
            return Err(SnapshotError::NotFound(self.path.clone()));
        }
        let json = fs::read_to_string(&self.path).map_err(|source| SnapshotError::ReadError {
            path: self.path.clone(),
            source,
        })?;
        let invalid = |source| SnapshotError::Invalid {
            path: self.path.clone(),
            source,
        };
        let snapshot = parse_snapshot(&json).map_err(invalid)?;
        let graph = restore(snapshot).map_err(invalid)?;
        tracing::info!(
            path = %self.path.display(),
            elements = graph.len(),
            "snapshot loaded"
        );
        Ok(graph)
    }

    /// Flatten and write the graph atomically.
    pub fn save(&self, graph: &VersionGraph) -> Result<(), SnapshotError> {
        let invalid = |source| SnapshotError::Invalid {
            path: self.path.clone(),
            source,
        };
        let snapshot = flatten(graph).map_err(invalid)?;
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| invalid(SchemaError::SerializeError(e.to_string())))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SnapshotError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let _lock = SnapshotLock::acquire(&self.path)?;

        let temp_path = sibling(&self.path, "tmp");
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SnapshotError::WriteError { path, source }
        };
        let mut file = File::create(&temp_path).map_err(write_err(&temp_path))?;
        file.write_all(json.as_bytes())
            .map_err(write_err(&temp_path))?;
        file.sync_all().map_err(write_err(&temp_path))?;
        drop(file);

        if self.keep_backup && self.path.exists() {
            let backup = sibling(&self.path, "bak");
            fs::rename(&self.path, &backup).map_err(write_err(&backup))?;
        }
        fs::rename(&temp_path, &self.path).map_err(write_err(&self.path))?;

        tracing::info!(
            path = %self.path.display(),
            elements = graph.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

/// Load several snapshots and merge them in order.
///
/// Earlier files win on oid collisions. Returns the merged graph and one
/// summary per merged-in file (the first file has none).
pub fn load_all<P: AsRef<Path>>(
    paths: &[P],
) -> Result<(VersionGraph, Vec<MergeSummary>), SnapshotError> {
    let mut merged: Option<VersionGraph> = None;
    let mut summaries = Vec::new();
    for path in paths {
        let graph = SnapshotStore::new(path.as_ref()).load()?;
        match merged.as_mut() {
            None => merged = Some(graph),
            Some(base) => {
                let summary = base.merge(graph);
                tracing::info!(
                    path = %path.as_ref().display(),
                    added = summary.added,
                    kept = summary.kept,
                    conflicts = summary.name_conflicts.len(),
                    "snapshot merged"
                );
                summaries.push(summary);
            }
        }
    }
    Ok((merged.unwrap_or_default(), summaries))
}
