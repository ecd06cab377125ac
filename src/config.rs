//! Interpreter configuration loaded from TOML
//!
//! ```toml
//! [scheduler]
//! max_steps = 1024
//! tick_budget = 100000
//!
//! [typecheck]
//! mode = "strict"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diagnostics::DiagnosticBag;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level interpreter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub scheduler: SchedulerConfig,
    pub typecheck: TypecheckConfig,
}

impl InterpreterConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Scheduler limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Default number of task steps one `flush` may run
    pub max_steps: usize,
    /// Number of task steps `drain` or a top-level `await` may run before giving up
    pub tick_budget: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_steps: 1024,
            tick_budget: 100_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypecheckConfig {
    pub mode: TypecheckMode,
}

/// How static diagnostics affect evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypecheckMode {
    /// Do not run the checker
    Off,
    /// Report diagnostics, evaluate anyway
    #[default]
    Warn,
    /// Refuse to evaluate modules with errors
    Strict,
}

impl TypecheckMode {
    pub fn runs_checker(self) -> bool {
        !matches!(self, TypecheckMode::Off)
    }

    /// Whether `diagnostics` should stop evaluation under this mode
    pub fn is_fatal(self, diagnostics: &DiagnosticBag) -> bool {
        matches!(self, TypecheckMode::Strict) && diagnostics.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InterpreterConfig::default();
        assert_eq!(config.scheduler.max_steps, 1024);
        assert_eq!(config.typecheck.mode, TypecheckMode::Warn);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InterpreterConfig::from_toml_str("[typecheck]\nmode = \"strict\"\n").unwrap();
        assert_eq!(config.typecheck.mode, TypecheckMode::Strict);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let result = InterpreterConfig::from_toml_str("[typecheck]\nmode = \"loud\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nmax_steps = 8\ntick_budget = 64").unwrap();

        let config = InterpreterConfig::load(file.path()).unwrap();
        assert_eq!(config.scheduler.max_steps, 8);
        assert_eq!(config.scheduler.tick_budget, 64);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = InterpreterConfig::load(&dir.path().join("able.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_strict_mode_fatal_only_on_errors() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::warning("W1001").message("redundant").build());
        assert!(!TypecheckMode::Strict.is_fatal(&bag));

        bag.push(Diagnostic::error("E1002").message("undefined").build());
        assert!(TypecheckMode::Strict.is_fatal(&bag));
        assert!(!TypecheckMode::Warn.is_fatal(&bag));
        assert!(!TypecheckMode::Off.runs_checker());
    }
}
