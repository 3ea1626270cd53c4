//! Configuration System
//!
//! Per-project configuration loading and the run-wide merge. A run has exactly one
//! [`GlobalConfig`] and one [`ProjectConfig`] per project root; each project config is paired
//! with the on-disk file it came from (if any). Tests included.

use crate::cli::ValidatedOptions;
use crate::error::RunError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

mod deprecations;
mod merge_policy;
mod reader;
mod resolve;

pub use deprecations::{find_deprecations, Deprecation, DEPRECATED_KEYS};
pub use reader::{resolve_config_path, ConfigSource, TomlConfigReader, CONFIG_FILE_NAMES};
pub use resolve::{get_configs, ResolvedConfigs};

/// Run-wide settings. One value per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalConfig {
    pub root_dir: PathBuf,
    /// Sub-project roots declared by the configuration (empty when not fanning out)
    pub projects: Vec<PathBuf>,
    pub test_path_pattern: Vec<String>,
    pub watch: bool,
    pub watch_all: bool,
    pub watchman: bool,
    pub json: bool,
    pub use_stderr: bool,
    pub list_tests: bool,
    pub only_changed: bool,
    pub changed_since: Option<String>,
    pub last_commit: bool,
    pub changed_files_with_ancestor: bool,
    pub force_exit: bool,
    pub max_workers: usize,
    pub test_failure_exit_code: i32,
}

impl GlobalConfig {
    /// Defaults for a run rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            projects: Vec::new(),
            test_path_pattern: Vec::new(),
            watch: false,
            watch_all: false,
            watchman: false,
            json: false,
            use_stderr: false,
            list_tests: false,
            only_changed: false,
            changed_since: None,
            last_commit: false,
            changed_files_with_ancestor: false,
            force_exit: false,
            max_workers: default_max_workers(false),
            test_failure_exit_code: merge_policy::DEFAULT_TEST_FAILURE_EXIT_CODE,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch || self.watch_all
    }
}

/// Settings for a single project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    pub root_dir: PathBuf,
    /// Directories searched for files (defaults to `root_dir`)
    pub roots: Vec<PathBuf>,
    pub cache: bool,
    pub cache_directory: PathBuf,
    pub test_match: Vec<String>,
    pub path_ignore_patterns: Vec<String>,
    /// Command run by the default engine; matched test files are appended as arguments
    pub test_command: Option<Vec<String>>,
    /// Runner version this project pins, if any
    pub runner_version: Option<String>,
}

impl ProjectConfig {
    /// Defaults for a project rooted at `root_dir`.
    pub fn new(name: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let root_dir = root_dir.into();
        Self {
            cache_directory: default_cache_directory(&name),
            roots: vec![root_dir.clone()],
            name,
            root_dir,
            cache: true,
            test_match: merge_policy::default_test_match(),
            path_ignore_patterns: merge_policy::default_path_ignore_patterns(),
            test_command: None,
            runner_version: None,
        }
    }
}

/// What one configuration load produced.
#[derive(Debug, Clone)]
pub struct ReadConfigResult {
    pub global_config: GlobalConfig,
    pub project_config: ProjectConfig,
    pub has_deprecation_warnings: bool,
    /// File the configuration came from; `None` for defaults or an inline `--config`
    pub config_path: Option<PathBuf>,
}

/// Loads the configuration for one project root.
///
/// `multi_project` is set when more than one root is active: the `--config` argument then
/// no longer applies and each root must find its own configuration.
#[async_trait]
pub trait ConfigReader: Send + Sync {
    async fn read_config(
        &self,
        options: &ValidatedOptions,
        root: &Path,
        project_index: usize,
        multi_project: bool,
    ) -> Result<ReadConfigResult, RunError>;
}

/// Worker count used when neither the command line nor the config sets one.
pub fn default_max_workers(watching: bool) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if watching {
        (cpus / 2).max(1)
    } else {
        cpus.saturating_sub(1).max(1)
    }
}

/// Per-project cache directory under the platform cache dir.
pub fn default_cache_directory(project_name: &str) -> PathBuf {
    directories::ProjectDirs::from("", "", "jig")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("jig"))
        .join(project_name)
}

/// Default project name: stable digest of where the configuration came from.
pub fn default_project_name(origin: &Path, project_index: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(origin.to_string_lossy().as_bytes());
    hasher.update(&(project_index as u64).to_le_bytes());
    hasher.finalize().to_hex().as_str()[..32].to_string()
}
