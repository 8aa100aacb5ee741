//! fetch command - Materialize one version's content
//!
//! Prints the path of a temporary file holding the content. The caller owns
//! the file.

use std::path::Path;

use anyhow::{Context as _, Result};

use super::{open_session, view_root, Context};
use crate::core::types::ElementVersionPath;
use crate::tool::VersionTool;

/// Run the fetch command.
pub fn fetch(ctx: &Context, root: Option<&Path>, version: &str) -> Result<()> {
    let versioned = ElementVersionPath::parse(version)
        .with_context(|| format!("Invalid versioned path '{version}'"))?;
    let config = ctx.load_config()?;
    let root = view_root(ctx, &config, root)?;

    let mut session = open_session(&config)?;
    if let Some(root) = &root {
        session
            .change_directory(&root.to_string_lossy())
            .with_context(|| format!("Failed to change tool directory to '{}'", root.display()))?;
    }
    let path = session
        .materialize_content(&versioned)
        .with_context(|| format!("Failed to fetch {versioned}"))?;
    if let Err(e) = session.close() {
        tracing::warn!(error = %e, "tool did not shut down cleanly");
    }

    println!("{}", path.display());
    Ok(())
}
