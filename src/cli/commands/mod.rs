//! cli::commands
//!
//! Command handlers. Each handler turns parsed arguments into calls on
//! [`crate::history`], [`crate::tool`] and [`crate::core::snapshot`], and
//! owns the human-readable output.

mod fetch;
mod inspect;
mod merge;
mod read;

pub use fetch::fetch;
pub use inspect::inspect;
pub use merge::merge;
pub use read::{read, ReadOptions};

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::tool::session::{SessionConfig, ToolSession};
use crate::ui::output::Verbosity;

/// Execution context shared by all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            cwd: None,
            verbosity: Verbosity::Normal,
        }
    }
}

impl Context {
    /// Directory relative paths are resolved against.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// `path` as given if absolute, otherwise under [`Self::working_dir`].
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.working_dir()?.join(path))
        }
    }

    /// Global plus project configuration.
    pub fn load_config(&self) -> Result<Config> {
        let dir = self.working_dir()?;
        let loaded = Config::load(Some(&dir)).context("Failed to load configuration")?;
        for source in &loaded.sources {
            tracing::debug!(path = %source.display(), "loaded config");
        }
        Ok(loaded.config)
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Read {
            root,
            elements,
            directories,
            versions,
            origin_date,
            load,
            save,
            new_versions,
        } => read::read(
            ctx,
            ReadOptions {
                root,
                elements,
                directories,
                versions,
                origin_date,
                load,
                save,
                new_versions,
            },
        ),
        Command::Inspect {
            snapshots,
            element,
            json,
        } => inspect::inspect(ctx, &snapshots, element.as_deref(), json),
        Command::Merge { output, snapshots } => merge::merge(ctx, &output, &snapshots),
        Command::Fetch { root, version } => fetch::fetch(ctx, root.as_deref(), &version),
    }
}

/// Start the configured tool.
fn open_session(config: &Config) -> Result<ToolSession> {
    let session_config = SessionConfig {
        program: config.program(),
        args: config.args(),
        prompt: config.prompt(),
    };
    ToolSession::spawn(&session_config)
        .with_context(|| format!("Failed to start '{}'", session_config.program))
}

/// View root from the flag, falling back to the configured one.
fn view_root(ctx: &Context, config: &Config, root: Option<&Path>) -> Result<Option<PathBuf>> {
    match root.map(Path::to_path_buf).or_else(|| config.clearcase_root()) {
        Some(root) => Ok(Some(ctx.resolve(&root)?)),
        None => Ok(None),
    }
}

/// Snapshot paths resolved against the working directory.
fn resolve_all(ctx: &Context, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| ctx.resolve(p)).collect()
}
