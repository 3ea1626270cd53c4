//! Config resolution across projects: single load, sub-project fan-out, multi-project reload,
//! duplicate detection, and the run-wide merge.

use super::reader::has_config_extension;
use super::{ConfigReader, GlobalConfig, ProjectConfig, ReadConfigResult};
use crate::cli::ValidatedOptions;
use crate::error::RunError;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Every configuration a run needs, paired by index.
#[derive(Debug, Clone)]
pub struct ResolvedConfigs {
    pub global_config: GlobalConfig,
    pub project_configs: Vec<ProjectConfig>,
    /// `config_paths[i]` is the file `project_configs[i]` was loaded from
    pub config_paths: Vec<Option<PathBuf>>,
    pub has_deprecation_warnings: bool,
}

/// Resolve the global configuration and one project configuration per root.
///
/// A single root is loaded once; if it declares `projects`, the run fans out to those roots.
/// With more than one root every root is (re)loaded in multi-project mode and the results
/// replace the single load's project list. The single load's global config wins when present.
pub async fn get_configs(
    reader: &dyn ConfigReader,
    roots: &[PathBuf],
    options: &ValidatedOptions,
) -> Result<ResolvedConfigs, RunError> {
    let mut projects: Vec<PathBuf> = roots.to_vec();
    let mut global_config: Option<GlobalConfig> = None;
    let mut project_configs: Vec<ProjectConfig> = Vec::new();
    let mut config_paths: Vec<Option<PathBuf>> = Vec::new();
    let mut has_deprecation_warnings = false;

    if let [root] = projects.as_slice() {
        let single = reader.read_config(options, root, 0, false).await?;
        has_deprecation_warnings = single.has_deprecation_warnings;
        if !single.global_config.projects.is_empty() {
            debug!(
                declared = single.global_config.projects.len(),
                "Configuration declares sub-projects"
            );
            projects = single.global_config.projects.clone();
        }
        project_configs.push(single.project_config);
        config_paths.push(single.config_path);
        global_config = Some(single.global_config);
    }

    if projects.len() > 1 {
        let loadable: Vec<&PathBuf> = projects.iter().filter(|root| is_loadable_root(root)).collect();
        let loads = try_join_all(
            loadable
                .iter()
                .enumerate()
                .map(|(index, root)| reader.read_config(options, root, index, true)),
        )
        .await?;

        ensure_no_duplicate_configs(&loadable, &loads)?;

        has_deprecation_warnings =
            has_deprecation_warnings || loads.iter().any(|l| l.has_deprecation_warnings);
        if global_config.is_none() {
            global_config = loads.first().map(|l| l.global_config.clone());
        }
        project_configs = Vec::with_capacity(loads.len());
        config_paths = Vec::with_capacity(loads.len());
        for load in loads {
            project_configs.push(load.project_config);
            config_paths.push(load.config_path);
        }
    }

    let global_config = match global_config {
        Some(global) if !project_configs.is_empty() => global,
        _ => {
            return Err(RunError::Configuration(
                "no configuration found for any project".to_string(),
            ))
        }
    };

    info!(
        projects = project_configs.len(),
        has_deprecation_warnings, "Resolved configuration"
    );

    Ok(ResolvedConfigs {
        global_config,
        project_configs,
        config_paths,
        has_deprecation_warnings,
    })
}

/// Skip plain files that cannot be configs (a `packages/*` glob also matches READMEs).
fn is_loadable_root(root: &Path) -> bool {
    !(root.is_file() && !has_config_extension(root))
}

/// Fail when two projects resolved to the same config file. Projects running on defaults
/// (no file) never collide.
fn ensure_no_duplicate_configs(
    roots: &[&PathBuf],
    loads: &[ReadConfigResult],
) -> Result<(), RunError> {
    if loads.len() <= 1 {
        return Ok(());
    }

    let mut seen: HashMap<&Path, usize> = HashMap::new();
    for (index, load) in loads.iter().enumerate() {
        let Some(path) = load.config_path.as_deref() else {
            continue;
        };
        if let Some(&first) = seen.get(path) {
            let pairs: Vec<String> = roots
                .iter()
                .zip(loads.iter())
                .map(|(root, load)| {
                    let config = load
                        .config_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(defaults)".to_string());
                    format!("    {} -> {}", root.display(), config)
                })
                .collect();
            return Err(RunError::Configuration(format!(
                "Whoops! Two projects resolved to the same config path: {}:\n\n  Project 1: {}\n  Project 2: {}\n\n  Resolved config paths:\n{}\n\nThis usually means that your \"projects\" config includes a directory that doesn't have any configuration recognizable by jig. Please fix it.",
                path.display(),
                roots[first].display(),
                roots[index].display(),
                pairs.join("\n")
            )));
        }
        seen.insert(path, index);
    }
    Ok(())
}
