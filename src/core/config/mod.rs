//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file (`vobgraph.toml` in the working directory)
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$VOBGRAPH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/vobgraph/config.toml`
//! 3. `~/.vobgraph/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use vobgraph::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("."))).unwrap().config;
//! println!("tool: {} (prompt {:?})", config.program(), config.prompt());
//! ```

pub mod schema;

pub use schema::{FileConfig, ImportSection, ToolSection};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::types::parse_cutoff;

/// Name of the project config file.
pub const PROJECT_CONFIG_FILE: &str = "vobgraph.toml";

/// Default interactive tool.
pub const DEFAULT_PROGRAM: &str = "cleartool";

/// Default tool prompt.
pub const DEFAULT_PROMPT: &str = "cleartool> ";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    /// Files that were read, in precedence order.
    pub sources: Vec<PathBuf>,
}

/// Merged configuration from all sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: FileConfig,
    pub project: Option<FileConfig>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads `vobgraph.toml` from it.
    /// Missing files are not an error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut sources = Vec::new();

        let global = match Self::global_path() {
            Some(path) => {
                let config = Self::read_file(&path)?;
                sources.push(path);
                config
            }
            None => FileConfig::default(),
        };

        let project = match project_dir.map(|dir| dir.join(PROJECT_CONFIG_FILE)) {
            Some(path) if path.exists() => {
                let config = Self::read_file(&path)?;
                sources.push(path);
                Some(config)
            }
            _ => None,
        };

        global.validate()?;
        if let Some(p) = &project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config { global, project },
            sources,
        })
    }

    /// First existing global config file.
    fn global_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VOBGRAPH_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("vobgraph/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".vobgraph/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse one config file.
    pub fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn tool_value<T>(&self, get: impl Fn(&ToolSection) -> Option<T>) -> Option<T> {
        self.project
            .as_ref()
            .and_then(|p| p.tool.as_ref())
            .and_then(&get)
            .or_else(|| self.global.tool.as_ref().and_then(&get))
    }

    fn import_value<T>(&self, get: impl Fn(&ImportSection) -> Option<T>) -> Option<T> {
        self.project
            .as_ref()
            .and_then(|p| p.import.as_ref())
            .and_then(&get)
            .or_else(|| self.global.import.as_ref().and_then(&get))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Interactive tool executable. Defaults to `cleartool`.
    pub fn program(&self) -> String {
        self.tool_value(|t| t.program.clone())
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string())
    }

    /// Extra tool arguments. Defaults to none.
    pub fn args(&self) -> Vec<String> {
        self.tool_value(|t| t.args.clone()).unwrap_or_default()
    }

    /// Tool prompt. Defaults to `cleartool> `.
    pub fn prompt(&self) -> String {
        self.tool_value(|t| t.prompt.clone())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string())
    }

    pub fn clearcase_root(&self) -> Option<PathBuf> {
        self.import_value(|i| i.clearcase_root.clone())
    }

    /// Configured cutoff date, if any. Validated at load time.
    pub fn origin_date(&self) -> Option<DateTime<Utc>> {
        self.import_value(|i| i.origin_date.clone())
            .and_then(|raw| parse_cutoff(&raw).ok())
    }

    pub fn snapshot(&self) -> Option<PathBuf> {
        self.import_value(|i| i.snapshot.clone())
    }

    /// One progress interval for every list. Unset means the per-list
    /// defaults (100 files, 20 directories, 100 versions).
    pub fn progress_every(&self) -> Option<usize> {
        self.import_value(|i| i.progress_every)
    }

    /// Whether to keep `.bak` copies of overwritten snapshots. Defaults to `true`.
    pub fn keep_backup(&self) -> bool {
        self.import_value(|i| i.keep_backup).unwrap_or(true)
    }
}
