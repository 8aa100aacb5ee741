//! read command - Discover history through the tool and save a snapshot
//!
//! # Example
//!
//! ```bash
//! # First import, everything up to the origin date
//! vobgraph read --root /view/vob --elements files.txt --directories dirs.txt \
//!     --origin-date 2024-01-31 --save graph.json
//!
//! # Incremental: add individual versions on top of an earlier snapshot
//! vobgraph read --root /view/vob --load graph.json --versions new.txt \
//!     --save graph.json --new-versions added.json
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use serde::Serialize;

use super::{open_session, resolve_all, view_root, Context};
use crate::core::model::VersionGraph;
use crate::core::snapshot::{load_all, SnapshotStore};
use crate::core::types::{parse_cutoff, BranchName, Oid, VersionKey};
use crate::history::{Diagnostics, HistoryReader, ProgressIntervals, ReadRequest};
use crate::ui::output;

/// Arguments of the read command.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub root: Option<PathBuf>,
    pub elements: Option<PathBuf>,
    pub directories: Option<PathBuf>,
    pub versions: Option<PathBuf>,
    pub origin_date: Option<String>,
    pub load: Vec<PathBuf>,
    pub save: Option<PathBuf>,
    pub new_versions: Option<PathBuf>,
}

/// One newly discovered version, as written by `--new-versions`.
#[derive(Debug, Serialize)]
struct NewVersionRecord<'a> {
    element: &'a str,
    oid: &'a Oid,
    branch: &'a BranchName,
    number: u32,
}

/// Run the read command.
pub fn read(ctx: &Context, options: ReadOptions) -> Result<()> {
    if options.elements.is_none() && options.directories.is_none() && options.versions.is_none() {
        bail!("Nothing to read: pass --elements, --directories or --versions");
    }
    let config = ctx.load_config()?;

    let cutoff = match &options.origin_date {
        Some(raw) => parse_cutoff(raw).with_context(|| format!("Invalid --origin-date '{raw}'"))?,
        None => config.origin_date().unwrap_or_else(Utc::now),
    };

    // the configured snapshot doubles as the default input and output
    let load: Vec<PathBuf> = if options.load.is_empty() {
        config
            .snapshot()
            .map(|p| ctx.resolve(&p))
            .transpose()?
            .filter(|p| p.exists())
            .into_iter()
            .collect()
    } else {
        resolve_all(ctx, &options.load)?
    };
    let save = match options.save.or_else(|| config.snapshot()) {
        Some(path) => Some(ctx.resolve(&path)?),
        None => None,
    };

    let graph = if load.is_empty() {
        VersionGraph::new()
    } else {
        let (graph, _) = load_all(&load).context("Failed to load snapshots")?;
        tracing::info!(snapshots = load.len(), elements = graph.len(), "seeded from snapshots");
        graph
    };

    let request = ReadRequest {
        elements_file: options.elements.map(|p| ctx.resolve(&p)).transpose()?,
        directories_file: options.directories.map(|p| ctx.resolve(&p)).transpose()?,
        versions_file: options.versions.map(|p| ctx.resolve(&p)).transpose()?,
    };
    let progress = config
        .progress_every()
        .map(ProgressIntervals::uniform)
        .unwrap_or_default();
    let root = view_root(ctx, &config, options.root.as_deref())?;

    tracing::info!(cutoff = %cutoff, "reading history");
    let session = open_session(&config)?;
    let mut reader =
        HistoryReader::new(session, graph, cutoff, Diagnostics::new()).with_progress(progress);
    if let Some(root) = &root {
        reader.change_directory(root)?;
    }
    let summary = reader.read(&request)?;
    let (graph, diagnostics, session) = reader.into_parts();
    if let Err(e) = session.close() {
        tracing::warn!(error = %e, "tool did not shut down cleanly");
    }

    if let (Some(path), Some(keys)) = (&options.new_versions, &summary.new_versions) {
        let path = ctx.resolve(path)?;
        write_new_versions(&graph, keys, &path)?;
    }

    if let Some(path) = &save {
        SnapshotStore::new(path)
            .with_backup(config.keep_backup())
            .save(&graph)
            .with_context(|| format!("Failed to save snapshot '{}'", path.display()))?;
        output::print(format!("Saved {}", path.display()), ctx.verbosity);
    } else {
        output::warn("no --save given, the graph was not written", ctx.verbosity);
    }

    let stats = graph.stats();
    output::print(
        output::format_table(
            &[
                ("elements", stats.elements),
                ("branches", stats.branches),
                ("versions", stats.versions),
                ("merge links", stats.merge_links),
                ("fixups resolved", summary.fixups.content_resolved + summary.fixups.merges_resolved),
                ("fixups dropped", summary.fixups.content_dropped + summary.fixups.merges_dropped),
            ],
            "",
        ),
        ctx.verbosity,
    );
    if let Some(keys) = &summary.new_versions {
        output::print(format!("new versions: {}", keys.len()), ctx.verbosity);
    }
    print_issues(ctx, &diagnostics);
    Ok(())
}

fn write_new_versions(graph: &VersionGraph, keys: &[VersionKey], path: &std::path::Path) -> Result<()> {
    let records: Vec<NewVersionRecord<'_>> = keys
        .iter()
        .map(|key| NewVersionRecord {
            element: graph.get(&key.element).map_or("", |e| e.name()),
            oid: &key.element,
            branch: &key.branch,
            number: key.number,
        })
        .collect();
    let json = serde_json::to_string_pretty(&records).context("Failed to encode new versions")?;
    fs::write(path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
    tracing::info!(path = %path.display(), count = records.len(), "wrote new versions");
    Ok(())
}

fn print_issues(ctx: &Context, diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    let summary: Vec<(&str, usize)> = diagnostics.summary().into_iter().collect();
    output::print("issues:", ctx.verbosity);
    output::print(output::format_table(&summary, "  "), ctx.verbosity);
}
