//! merge command - Combine snapshots into one file
//!
//! # Design
//!
//! Snapshots are merged in command-line order. On an oid present in more
//! than one input the first one wins; a differing name is reported.
//!
//! # Example
//!
//! ```bash
//! vobgraph merge --output all.json vob1.json vob2.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::{resolve_all, Context};
use crate::core::snapshot::{load_all, SnapshotStore};
use crate::ui::output;

/// Run the merge command.
pub fn merge(ctx: &Context, output_path: &Path, snapshots: &[PathBuf]) -> Result<()> {
    let paths = resolve_all(ctx, snapshots)?;
    let (graph, summaries) = load_all(&paths).context("Failed to load snapshots")?;

    for (path, summary) in paths.iter().skip(1).zip(&summaries) {
        output::print(
            format!(
                "{}: {} added, {} already present",
                path.display(),
                summary.added,
                summary.kept
            ),
            ctx.verbosity,
        );
        for (oid, kept, ignored) in &summary.name_conflicts {
            output::warn(
                format!("{oid}: kept name '{kept}', ignored '{ignored}'"),
                ctx.verbosity,
            );
        }
    }

    graph
        .validate()
        .context("Merged graph has dangling references")?;

    let target = ctx.resolve(output_path)?;
    let config = ctx.load_config()?;
    SnapshotStore::new(&target)
        .with_backup(config.keep_backup())
        .save(&graph)
        .with_context(|| format!("Failed to save snapshot '{}'", target.display()))?;
    output::print(
        format!("Saved {} elements to {}", graph.len(), target.display()),
        ctx.verbosity,
    );
    Ok(())
}
