//! Capture configuration via `testscope.toml`
//!
//! The file lives next to the subject project. When missing, a commented
//! default is written on first use; edit it to tune what the tracer skips
//! and which side effects are recorded.

use serde::{Deserialize, Serialize};
use std::path::Path;
use testscope_core::{Error, Result};

/// Config file name placed in the project root.
pub const CONFIG_FILE_NAME: &str = "testscope.toml";

fn default_ignored_code_names() -> Vec<String> {
    vec!["<module>".to_string(), "<genexpr>".to_string()]
}

fn default_ignored_exceptions() -> Vec<String> {
    vec!["GeneratorExit".to_string()]
}

fn default_true() -> bool {
    true
}

/// Capture configuration loaded from `testscope.toml`.
///
/// # Example
///
/// ```toml
/// ignored_code_names = ["<module>", "<genexpr>"]
/// ignored_exceptions = ["GeneratorExit"]
/// record_opaque_side_effects = true
/// record_global_reads = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Code names whose frames are never captured nor descended into.
    #[serde(default = "default_ignored_code_names")]
    pub ignored_code_names: Vec<String>,
    /// Exception type names dropped before they reach the controller.
    #[serde(default = "default_ignored_exceptions")]
    pub ignored_exceptions: Vec<String>,
    /// Record registered container mutations made by opaque calls.
    #[serde(default = "default_true")]
    pub record_opaque_side_effects: bool,
    /// Record reads of module-level names.
    #[serde(default = "default_true")]
    pub record_global_reads: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ignored_code_names: default_ignored_code_names(),
            ignored_exceptions: default_ignored_exceptions(),
            record_opaque_side_effects: true,
            record_global_reads: true,
        }
    }
}

impl CaptureConfig {
    /// Whether frames of code named `name` are skipped
    pub fn ignores_code(&self, name: &str) -> bool {
        self.ignored_code_names.iter().any(|n| n == name)
    }

    /// Whether exceptions of type `type_name` are dropped
    pub fn ignores_exception(&self, type_name: &str) -> bool {
        self.ignored_exceptions.iter().any(|n| n == type_name)
    }

    /// Check the loaded values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured name is empty.
    pub fn validate(&self) -> Result<()> {
        if let Some(blank) = self
            .ignored_code_names
            .iter()
            .chain(self.ignored_exceptions.iter())
            .find(|n| n.trim().is_empty())
        {
            return Err(Error::InvalidConfig(format!(
                "empty name {:?} in {}",
                blank, CONFIG_FILE_NAME
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# testscope capture configuration
#
# Frames running code with these names are neither captured nor descended into.
ignored_code_names = ["<module>", "<genexpr>"]

# Exceptions of these types are dropped before they reach a captured call.
ignored_exceptions = ["GeneratorExit"]

# Record list/dict/set mutations performed by third-party calls (default: true)
record_opaque_side_effects = true

# Record reads of module-level names (default: true)
record_global_reads = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CaptureConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config in `dir`, writing the default file first if missing.
    pub fn load_or_init(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
