//! Config file source: `jig.toml` / `jig.json` discovery, loading, and normalization.

use super::deprecations::find_deprecations;
use super::merge_policy::{self, flag, prefer};
use super::{
    default_max_workers, default_project_name, ConfigReader, GlobalConfig, ProjectConfig,
    ReadConfigResult,
};
use crate::cli::{print_deprecation, ConfigArg, ValidatedOptions};
use crate::error::RunError;
use async_trait::async_trait;
use config::{FileFormat, Source};
use globset::GlobBuilder;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File names searched in a project root and its ancestors, in priority order.
pub const CONFIG_FILE_NAMES: &[&str] = &["jig.toml", "jig.json"];

const ROOT_DIR_TOKEN: &str = "<rootDir>";

const KNOWN_KEYS: &[&str] = &[
    "name",
    "root_dir",
    "roots",
    "projects",
    "cache",
    "cache_directory",
    "test_match",
    "path_ignore_patterns",
    "test_command",
    "runner_version",
    "watch",
    "watch_all",
    "watchman",
    "json",
    "use_stderr",
    "list_tests",
    "only_changed",
    "changed_since",
    "last_commit",
    "changed_files_with_ancestor",
    "force_exit",
    "max_workers",
    "test_failure_exit_code",
];

/// Raw file model. Every field is optional; defaults come from the merge policy.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    name: Option<String>,
    root_dir: Option<PathBuf>,
    roots: Option<Vec<PathBuf>>,
    test_path_dirs: Option<Vec<PathBuf>>,
    projects: Option<Vec<String>>,
    cache: Option<bool>,
    cache_directory: Option<PathBuf>,
    test_match: Option<Vec<String>>,
    path_ignore_patterns: Option<Vec<String>>,
    test_command: Option<Vec<String>>,
    runner_version: Option<String>,
    watch: Option<bool>,
    watch_all: Option<bool>,
    watchman: Option<bool>,
    json: Option<bool>,
    use_stderr: Option<bool>,
    list_tests: Option<bool>,
    only_changed: Option<bool>,
    changed_since: Option<String>,
    last_commit: Option<bool>,
    changed_files_with_ancestor: Option<bool>,
    force_exit: Option<bool>,
    max_workers: Option<usize>,
    test_failure_exit_code: Option<i32>,
}

/// Where a project's configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Inline(String),
    /// No file found; defaults rooted at the given directory
    Defaults(PathBuf),
}

/// Locate the configuration for `root`.
///
/// In single-project mode `--config` wins. Otherwise `root` itself is used when it is a file,
/// else `root` and then each ancestor is searched for one of [`CONFIG_FILE_NAMES`].
pub fn resolve_config_path(
    root: &Path,
    options: &ValidatedOptions,
    multi_project: bool,
    cwd: &Path,
) -> Result<ConfigSource, RunError> {
    if !multi_project {
        match &options.config {
            Some(ConfigArg::Inline(json)) => return Ok(ConfigSource::Inline(json.clone())),
            Some(ConfigArg::Path(path)) => {
                let path = absolutize(path, cwd);
                if !path.is_file() {
                    return Err(RunError::Configuration(format!(
                        "Can't find a config file at {}",
                        path.display()
                    )));
                }
                return Ok(ConfigSource::File(path));
            }
            None => {}
        }
    }

    let root = absolutize(root, cwd);
    if root.is_file() {
        return Ok(ConfigSource::File(root));
    }
    if !root.exists() {
        return Err(RunError::Configuration(format!(
            "Can't find a root directory while resolving a config file path.\nProvided path to resolve: {}\ncwd: {}",
            root.display(),
            cwd.display()
        )));
    }

    let mut dir = Some(root.as_path());
    while let Some(current) = dir {
        let found: Vec<PathBuf> = CONFIG_FILE_NAMES
            .iter()
            .map(|name| current.join(name))
            .filter(|candidate| candidate.is_file())
            .collect();
        if found.len() > 1 {
            let listing: Vec<String> = found
                .iter()
                .map(|p| format!("    * {}", p.display()))
                .collect();
            return Err(RunError::Configuration(format!(
                "Multiple configurations found:\n{}\n\n  Implicit config resolution does not allow multiple configuration files.\n  Either remove unused config files or select one explicitly with `--config`.",
                listing.join("\n")
            )));
        }
        if let Some(path) = found.into_iter().next() {
            return Ok(ConfigSource::File(path));
        }
        dir = current.parent();
    }

    Ok(ConfigSource::Defaults(root))
}

/// Reads `jig.toml` / `jig.json` files through the `config` crate and applies command-line
/// overrides on top.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigReader {
    cwd: Option<PathBuf>,
}

impl TomlConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `cwd` instead of the process working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }

    fn cwd(&self) -> Result<PathBuf, RunError> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Synchronous load; the async trait method runs this on the blocking pool.
    pub fn read_blocking(
        &self,
        options: &ValidatedOptions,
        root: &Path,
        project_index: usize,
        multi_project: bool,
    ) -> Result<ReadConfigResult, RunError> {
        let cwd = self.cwd()?;
        let source = resolve_config_path(root, options, multi_project, &cwd)?;
        debug!(root = %root.display(), source = ?source, multi_project, "Loading configuration");

        let builder = merge_policy::builder_with_defaults()?;
        let (builder, config_path, config_dir) = match &source {
            ConfigSource::File(path) => {
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                (
                    builder.add_source(config::File::from(path.as_path()).required(true)),
                    Some(path.clone()),
                    dir,
                )
            }
            ConfigSource::Inline(json) => (
                builder.add_source(config::File::from_str(json, FileFormat::Json)),
                None,
                cwd.clone(),
            ),
            ConfigSource::Defaults(dir) => (builder, None, dir.clone()),
        };

        let invalid = |e: config::ConfigError| match &config_path {
            Some(path) => RunError::InvalidConfigFile {
                path: path.clone(),
                reason: e.to_string(),
            },
            None => RunError::Configuration(e.to_string()),
        };

        let built = builder.build().map_err(invalid)?;
        let keys: Vec<String> = built.collect().map_err(invalid)?.into_keys().collect();
        let raw: RawConfig = built.try_deserialize().map_err(invalid)?;

        let deprecations = find_deprecations(keys.iter().map(String::as_str));
        for deprecation in &deprecations {
            warn!(key = deprecation.key, config_path = ?config_path, "Deprecated configuration option");
            print_deprecation(&deprecation.message());
        }
        for key in &keys {
            let deprecated = deprecations.iter().any(|d| d.key == key);
            if !deprecated && !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key = %key, config_path = ?config_path, "Unknown option in configuration");
            }
        }

        let mut root_dir = match &raw.root_dir {
            Some(dir) => resolve_path_option(dir, &config_dir),
            None => config_dir.clone(),
        };
        if !multi_project {
            if let Some(dir) = &options.root_dir {
                root_dir = absolutize(dir, &cwd);
            }
        }
        if !root_dir.is_dir() {
            return Err(RunError::Configuration(format!(
                "Directory {} in the root_dir option was not found.",
                root_dir.display()
            )));
        }

        let origin = config_path.clone().unwrap_or_else(|| root_dir.clone());
        let (global_config, project_config) =
            normalize(raw, options, &root_dir, &origin, project_index)?;

        Ok(ReadConfigResult {
            global_config,
            project_config,
            has_deprecation_warnings: !deprecations.is_empty(),
            config_path,
        })
    }
}

#[async_trait]
impl ConfigReader for TomlConfigReader {
    async fn read_config(
        &self,
        options: &ValidatedOptions,
        root: &Path,
        project_index: usize,
        multi_project: bool,
    ) -> Result<ReadConfigResult, RunError> {
        let reader = self.clone();
        let options = options.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            reader.read_blocking(&options, &root, project_index, multi_project)
        })
        .await
        .map_err(|e| RunError::Configuration(format!("Config reader task failed: {}", e)))?
    }
}

fn normalize(
    raw: RawConfig,
    options: &ValidatedOptions,
    root_dir: &Path,
    origin: &Path,
    project_index: usize,
) -> Result<(GlobalConfig, ProjectConfig), RunError> {
    let name = raw
        .name
        .clone()
        .unwrap_or_else(|| default_project_name(origin, project_index));
    let mut project = ProjectConfig::new(name, root_dir);
    if let Some(roots) = raw.roots.as_ref().or(raw.test_path_dirs.as_ref()) {
        project.roots = roots
            .iter()
            .map(|r| resolve_path_option(r, root_dir))
            .collect();
    }
    project.cache = prefer(options.cache, raw.cache).unwrap_or(true);
    if let Some(dir) = &raw.cache_directory {
        project.cache_directory = resolve_path_option(dir, root_dir);
    }
    if let Some(test_match) = raw.test_match {
        project.test_match = test_match;
    }
    if let Some(patterns) = raw.path_ignore_patterns {
        project.path_ignore_patterns = patterns;
    }
    project.test_command = raw.test_command;
    project.runner_version = raw.runner_version;

    let mut projects = Vec::new();
    for entry in raw.projects.unwrap_or_default() {
        projects.extend(expand_project_entry(&entry, root_dir)?);
    }

    let watch = flag(options.watch, raw.watch);
    let watch_all = flag(options.watch_all, raw.watch_all);
    let changed_since = prefer(options.changed_since.clone(), raw.changed_since);
    let last_commit = flag(options.last_commit, raw.last_commit);
    let only_changed = !watch_all
        && (flag(options.only_changed, raw.only_changed)
            || changed_since.is_some()
            || last_commit
            || watch);

    let global = GlobalConfig {
        root_dir: root_dir.to_path_buf(),
        projects,
        test_path_pattern: options.test_path_pattern.clone(),
        watch,
        watch_all,
        watchman: flag(options.watchman, raw.watchman),
        json: flag(options.json, raw.json),
        use_stderr: flag(options.use_stderr, raw.use_stderr),
        list_tests: flag(options.list_tests, raw.list_tests),
        only_changed,
        changed_since,
        last_commit,
        changed_files_with_ancestor: flag(
            options.changed_files_with_ancestor,
            raw.changed_files_with_ancestor,
        ),
        force_exit: flag(options.force_exit, raw.force_exit),
        max_workers: prefer(options.max_workers, raw.max_workers)
            .unwrap_or_else(|| default_max_workers(watch || watch_all)),
        test_failure_exit_code: prefer(options.test_failure_exit_code, raw.test_failure_exit_code)
            .unwrap_or(merge_policy::DEFAULT_TEST_FAILURE_EXIT_CODE),
    };
    if !(0..=255).contains(&global.test_failure_exit_code) {
        return Err(RunError::Configuration(format!(
            "test_failure_exit_code in {} must be between 0 and 255 (got {})",
            origin.display(),
            global.test_failure_exit_code
        )));
    }

    Ok((global, project))
}

/// Expand one `projects` entry into project roots. Globs expand to matching directories and
/// config files, sorted by path.
fn expand_project_entry(entry: &str, root_dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let path = resolve_path_option(Path::new(entry), root_dir);
    let pattern = path.to_string_lossy().replace('\\', "/");
    if !has_glob_meta(&pattern) {
        return Ok(vec![path]);
    }

    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| RunError::Configuration(format!("Invalid projects glob '{}': {}", entry, e)))?
        .compile_matcher();

    let base: PathBuf = path
        .components()
        .take_while(|c| !has_glob_meta(&c.as_os_str().to_string_lossy()))
        .collect();
    let mut walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
    if !pattern.contains("**") {
        let depth = path.components().count() - base.components().count();
        walker = walker.max_depth(depth);
    }

    let matches = walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir() || has_config_extension(entry.path()))
        .filter(|entry| matcher.is_match(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    Ok(matches)
}

/// Whether a path names a loadable config file by its extension.
pub(crate) fn has_config_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml") | Some("json")
    )
}

fn has_glob_meta(value: &str) -> bool {
    value.contains(['*', '?', '[', '{'])
}

/// Substitute `<rootDir>` and resolve relative paths against `root_dir`.
fn resolve_path_option(value: &Path, root_dir: &Path) -> PathBuf {
    let text = value.to_string_lossy();
    let replaced = if text.contains(ROOT_DIR_TOKEN) {
        PathBuf::from(text.replace(ROOT_DIR_TOKEN, &root_dir.to_string_lossy()))
    } else {
        value.to_path_buf()
    };
    absolutize(&replaced, root_dir)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
