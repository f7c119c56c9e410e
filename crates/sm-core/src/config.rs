//! Session configuration (`semantic-model.yml`)

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Editing session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Rewrite dependent expressions when a referenced object is renamed
    #[serde(default = "default_formula_fixup")]
    pub formula_fixup: bool,

    /// Maximum number of undoable batches kept in history (unbounded when absent)
    #[serde(default)]
    pub undo_limit: Option<usize>,

    /// Characters that separate levels of a display-folder path
    #[serde(default = "default_folder_separators")]
    pub folder_separators: Vec<char>,

    /// Maximum number of child lines listed in a single error roll-up
    #[serde(default = "default_max_error_lines")]
    pub max_error_lines: usize,
}

fn default_formula_fixup() -> bool {
    true
}

fn default_folder_separators() -> Vec<char> {
    vec!['/', '\\']
}

fn default_max_error_lines() -> usize {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            formula_fixup: default_formula_fixup(),
            undo_limit: None,
            folder_separators: default_folder_separators(),
            max_error_lines: default_max_error_lines(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        let config: SessionConfig = if content.trim().is_empty() {
            SessionConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.folder_separators.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "folder_separators must contain at least one character".to_string(),
            });
        }

        if let Some(sep) = self
            .folder_separators
            .iter()
            .find(|c| c.is_whitespace() || **c == ';')
        {
            return Err(CoreError::ConfigInvalid {
                message: format!("'{}' cannot be used as a folder separator", sep.escape_default()),
            });
        }

        if self.undo_limit == Some(0) {
            return Err(CoreError::ConfigInvalid {
                message: "undo_limit must be greater than zero (omit it for unbounded history)"
                    .to_string(),
            });
        }

        if self.max_error_lines == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "max_error_lines must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
