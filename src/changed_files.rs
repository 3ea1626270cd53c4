//! Changed-file detection for `--onlyChanged` runs.
//!
//! The lookup starts before the file indexes are built and runs as a detached task; whoever
//! needs the result joins it later, any number of times.

use crate::config::{GlobalConfig, ProjectConfig};
use crate::error::RunError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Files changed in the repositories that contain the project roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub repos: BTreeSet<PathBuf>,
    pub files: BTreeSet<PathBuf>,
}

/// Which changes count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFilesQuery {
    pub changed_since: Option<String>,
    pub last_commit: bool,
    pub with_ancestor: bool,
}

impl ChangedFilesQuery {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            changed_since: global.changed_since.clone(),
            last_commit: global.last_commit,
            with_ancestor: global.changed_files_with_ancestor,
        }
    }
}

/// Looks up changed files under a set of roots.
#[async_trait]
pub trait ChangedFilesProvider: Send + Sync {
    async fn changed_files(
        &self,
        roots: &[PathBuf],
        query: &ChangedFilesQuery,
    ) -> Result<ChangedFiles, RunError>;
}

type SharedLookup = Shared<BoxFuture<'static, Result<Arc<ChangedFiles>, String>>>;

/// Handle to an in-flight (or never started) changed-files lookup.
#[derive(Clone)]
pub struct ChangedFilesPromise {
    lookup: Option<SharedLookup>,
}

impl std::fmt::Debug for ChangedFilesPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangedFilesPromise")
            .field("started", &self.is_started())
            .finish()
    }
}

impl ChangedFilesPromise {
    /// A promise that never resolves to a change set.
    pub fn none() -> Self {
        Self { lookup: None }
    }

    /// Spawn the lookup over the union of every project's roots when `only_changed` is set.
    pub fn start(
        provider: Arc<dyn ChangedFilesProvider>,
        global: &GlobalConfig,
        configs: &[ProjectConfig],
    ) -> Self {
        if !global.only_changed {
            return Self::none();
        }

        let roots: Vec<PathBuf> = configs
            .iter()
            .flat_map(|config| config.roots.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let query = ChangedFilesQuery::from_global(global);
        debug!(roots = roots.len(), ?query, "Starting changed files lookup");

        let task = tokio::spawn(async move { provider.changed_files(&roots, &query).await });
        let lookup = async move {
            match task.await {
                Ok(Ok(changed)) => Ok(Arc::new(changed)),
                Ok(Err(RunError::ChangedFiles(message))) => Err(message),
                Ok(Err(other)) => Err(other.to_string()),
                Err(join) => Err(join.to_string()),
            }
        }
        .boxed()
        .shared();

        Self {
            lookup: Some(lookup),
        }
    }

    pub fn is_started(&self) -> bool {
        self.lookup.is_some()
    }

    /// Wait for the lookup. `Ok(None)` when none was started.
    pub async fn join(&self) -> Result<Option<Arc<ChangedFiles>>, RunError> {
        match &self.lookup {
            None => Ok(None),
            Some(lookup) => lookup
                .clone()
                .await
                .map(Some)
                .map_err(RunError::ChangedFiles),
        }
    }
}

/// Changed files according to the `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitChangedFiles;

#[async_trait]
impl ChangedFilesProvider for GitChangedFiles {
    async fn changed_files(
        &self,
        roots: &[PathBuf],
        query: &ChangedFilesQuery,
    ) -> Result<ChangedFiles, RunError> {
        let started = Instant::now();
        let mut changed = ChangedFiles::default();

        for root in roots {
            match find_repo_root(root).await? {
                Some(repo) => {
                    changed.repos.insert(repo);
                }
                None => debug!(root = %root.display(), "Not inside a git repository"),
            }
        }

        for repo in &changed.repos {
            for args in diff_commands(query) {
                let output = git(repo, &args).await?;
                changed.files.extend(
                    output
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| repo.join(line)),
                );
            }
        }

        // git reports paths under the canonical repo root; the file indexes use the roots as
        // configured, which may go through symlinks.
        let prefixes: Vec<(&PathBuf, PathBuf)> = roots
            .iter()
            .map(|root| (root, dunce::canonicalize(root).unwrap_or_else(|_| root.clone())))
            .collect();
        changed.files = changed
            .files
            .iter()
            .flat_map(|file| {
                prefixes.iter().filter_map(move |(root, canonical)| {
                    file.strip_prefix(canonical).ok().map(|rest| root.join(rest))
                })
            })
            .collect();

        info!(
            repos = changed.repos.len(),
            files = changed.files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Changed files resolved"
        );
        Ok(changed)
    }
}

/// `git` invocations whose `--name-only` output together form the change set.
fn diff_commands(query: &ChangedFilesQuery) -> Vec<Vec<String>> {
    let args = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let untracked = args(&["ls-files", "--others", "--exclude-standard"]);

    if query.last_commit {
        return vec![args(&["show", "--name-only", "--pretty=format:", "HEAD"])];
    }
    if let Some(since) = &query.changed_since {
        return vec![
            vec![
                "diff".to_string(),
                "--name-only".to_string(),
                format!("{}...HEAD", since),
            ],
            args(&["diff", "--name-only", "HEAD"]),
            untracked,
        ];
    }
    if query.with_ancestor {
        return vec![args(&["diff", "--name-only", "HEAD^"]), untracked];
    }
    vec![
        args(&["diff", "--cached", "--name-only"]),
        args(&["diff", "--name-only"]),
        untracked,
    ]
}

async fn find_repo_root(dir: &Path) -> Result<Option<PathBuf>, RunError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .await
        .map_err(missing_git)?;
    if !output.status.success() {
        return Ok(None);
    }
    let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Some(dunce::canonicalize(&top).unwrap_or_else(|_| PathBuf::from(top))))
}

async fn git(repo: &Path, args: &[String]) -> Result<String, RunError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(missing_git)?;
    if !output.status.success() {
        return Err(RunError::ChangedFiles(format!(
            "git {} failed in {}: {}",
            args.join(" "),
            repo.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn missing_git(err: std::io::Error) -> RunError {
    if err.kind() == ErrorKind::NotFound {
        RunError::ChangedFiles(
            "git was not found on PATH; --onlyChanged and --watch need a git checkout".to_string(),
        )
    } else {
        RunError::ChangedFiles(format!("failed to run git: {}", err))
    }
}
