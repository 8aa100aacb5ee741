//! core::config::schema
//!
//! Configuration file schema.
//!
//! The same shape is used for the global file and the project file
//! (`vobgraph.toml`); the project file overrides the global one key by key.
//!
//! # Validation
//!
//! Values are validated after parsing: the prompt must be usable by the
//! stream framer and the origin date must parse.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::parse_cutoff;
use crate::tool::protocol::PromptFramer;

/// One configuration file.
///
/// # Example
///
/// ```toml
/// [tool]
/// program = "cleartool"
/// prompt = "cleartool> "
///
/// [import]
/// clearcase_root = "M:/view/vob"
/// origin_date = "2023-06-30"
/// snapshot = "vob.snapshot.json"
/// progress_every = 100
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Interactive tool settings
    pub tool: Option<ToolSection>,

    /// Import defaults
    pub import: Option<ImportSection>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tool) = &self.tool {
            tool.validate()?;
        }
        if let Some(import) = &self.import {
            import.validate()?;
        }
        Ok(())
    }
}

/// `[tool]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSection {
    /// Executable started for the interactive session
    pub program: Option<String>,

    /// Extra arguments for the executable
    pub args: Option<Vec<String>>,

    /// Prompt printed by the tool when it is ready for a command
    pub prompt: Option<String>,
}

impl ToolSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(program) = &self.program {
            if program.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "tool.program cannot be empty".to_string(),
                ));
            }
        }
        if let Some(prompt) = &self.prompt {
            validate_prompt(prompt)?;
        }
        Ok(())
    }
}

/// The prompt has to be one the stream framer accepts.
pub fn validate_prompt(prompt: &str) -> Result<(), ConfigError> {
    PromptFramer::new(prompt)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("tool.prompt: {e}")))
}

/// `[import]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSection {
    /// Directory the tool session changes into before reading
    pub clearcase_root: Option<PathBuf>,

    /// Versions created after this date are not imported
    pub origin_date: Option<String>,

    /// Snapshot file saved after a read
    pub snapshot: Option<PathBuf>,

    /// Emit a progress event every N elements/versions
    pub progress_every: Option<usize>,

    /// Keep the previous snapshot as `.bak` when overwriting
    pub keep_backup: Option<bool>,
}

impl ImportSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(date) = &self.origin_date {
            parse_cutoff(date).map_err(|e| {
                ConfigError::InvalidValue(format!("import.origin_date: {e}"))
            })?;
        }
        if self.progress_every == Some(0) {
            return Err(ConfigError::InvalidValue(
                "import.progress_every must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
