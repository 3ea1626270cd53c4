//! Error types for the Jig run orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Command-line validation errors. Raised before any orchestration starts.
#[derive(Debug, Error)]
pub enum ArgvValidationError {
    #[error("{0}")]
    Parse(String),

    #[error("Invalid option --{option}: {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Both --{first} and --{second} were specified, but these two options do not make sense together. Try the --help flag for more information.")]
    Conflicting {
        first: &'static str,
        second: &'static str,
    },
}

impl From<clap::Error> for ArgvValidationError {
    fn from(err: clap::Error) -> Self {
        ArgvValidationError::Parse(err.to_string())
    }
}

/// Orchestration errors. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid config file {path}: {reason}")]
    InvalidConfigFile { path: PathBuf, reason: String },

    #[error("Failed to prepare cache directory {path}: {source}")]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File index build failed for project '{project}': {reason}")]
    HasteMap { project: String, reason: String },

    #[error("Changed files lookup failed: {0}")]
    ChangedFiles(String),

    #[error("Test execution failed: {0}")]
    Engine(String),

    #[error("Watch mode failed: {0}")]
    Watch(String),

    #[error("Runner delegation failed: {0}")]
    Delegation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RunError {
    fn from(err: config::ConfigError) -> Self {
        RunError::Configuration(err.to_string())
    }
}

impl From<notify::Error> for RunError {
    fn from(err: notify::Error) -> Self {
        RunError::Watch(err.to_string())
    }
}
