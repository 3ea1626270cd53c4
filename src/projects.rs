//! Project root resolution.
//!
//! Produces the ordered list of project roots a run starts from. Order is preserved from the
//! command line so duplicate reporting and context ordering stay deterministic.

use crate::cli::ValidatedOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve project roots against the process working directory.
pub fn get_projects(options: &ValidatedOptions, explicit_project: Option<&Path>) -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    get_projects_from(options, explicit_project, &cwd)
}

/// Resolve project roots against `cwd`. Always returns at least one root.
pub fn get_projects_from(
    options: &ValidatedOptions,
    explicit_project: Option<&Path>,
    cwd: &Path,
) -> Vec<PathBuf> {
    let mut projects: Vec<PathBuf> = options.projects.clone();

    if let Some(project) = explicit_project {
        projects.push(project.to_path_buf());
    }

    // Mapped drives make the reported cwd differ from the real one on Windows.
    if projects.is_empty() && cfg!(windows) {
        if let Ok(real) = dunce::canonicalize(cwd) {
            projects.push(real);
        }
    }

    if projects.is_empty() {
        projects.push(cwd.to_path_buf());
    }

    debug!(roots = ?projects, "Resolved project roots");
    projects
}
