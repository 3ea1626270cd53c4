//! File index ("haste map") builders.
//!
//! The orchestrator only needs a handle it can build (and, in watch mode, rebuild). The
//! default builder walks each project root and records every file not excluded by
//! `path_ignore_patterns`; it keeps no on-disk cache.

use crate::config::ProjectConfig;
use crate::error::RunError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Sorted set of files belonging to one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    files: Vec<PathBuf>,
}

impl FileIndex {
    pub fn new(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

/// Run-wide settings every builder is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasteMapOptions {
    pub max_workers: usize,
    /// Ignore anything cached from an earlier run (set when the project disables caching)
    pub reset_cache: bool,
    pub watch: bool,
    pub watchman: bool,
}

/// A file-index builder scoped to one project.
#[async_trait]
pub trait HasteMap: Send + Sync {
    async fn build(&self) -> Result<FileIndex, RunError>;
}

/// Creates one [`HasteMap`] per project.
pub trait HasteMapFactory: Send + Sync {
    fn create(
        &self,
        config: &ProjectConfig,
        options: &HasteMapOptions,
    ) -> Result<Arc<dyn HasteMap>, RunError>;
}

/// Default factory producing [`WalkHasteMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkHasteMapFactory;

impl HasteMapFactory for WalkHasteMapFactory {
    fn create(
        &self,
        config: &ProjectConfig,
        options: &HasteMapOptions,
    ) -> Result<Arc<dyn HasteMap>, RunError> {
        Ok(Arc::new(WalkHasteMap::new(config, options)?))
    }
}

/// Walks each project root with `walkdir`, one blocking task per root, at most
/// `max_workers` at a time.
#[derive(Debug, Clone)]
pub struct WalkHasteMap {
    project: String,
    roots: Vec<PathBuf>,
    ignore: GlobSet,
    options: HasteMapOptions,
}

impl WalkHasteMap {
    pub fn new(config: &ProjectConfig, options: &HasteMapOptions) -> Result<Self, RunError> {
        Ok(Self {
            project: config.name.clone(),
            roots: config.roots.clone(),
            ignore: build_glob_set(&config.path_ignore_patterns).map_err(|reason| {
                RunError::HasteMap {
                    project: config.name.clone(),
                    reason,
                }
            })?,
            options: options.clone(),
        })
    }
}

#[async_trait]
impl HasteMap for WalkHasteMap {
    async fn build(&self) -> Result<FileIndex, RunError> {
        if self.options.reset_cache {
            debug!(project = %self.project, "Cache disabled; building file index from scratch");
        }

        let per_root: Vec<Vec<PathBuf>> = stream::iter(self.roots.clone())
            .map(|root| {
                let ignore = self.ignore.clone();
                let project = self.project.clone();
                async move {
                    tokio::task::spawn_blocking(move || crawl(&root, &ignore))
                        .await
                        .map_err(|e| RunError::HasteMap {
                            project,
                            reason: e.to_string(),
                        })
                }
            })
            .buffered(self.options.max_workers.max(1))
            .try_collect()
            .await?;

        let index = FileIndex::new(per_root.into_iter().flatten().collect());
        debug!(project = %self.project, files = index.len(), "Crawled project roots");
        Ok(index)
    }
}

/// Files under `root` not matched by `ignore`. Missing roots contribute nothing.
fn crawl(root: &Path, ignore: &GlobSet) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !ignore.is_match(entry.path()))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Compile glob patterns; `*` does not cross directory separators.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet, String> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> HasteMapOptions {
        HasteMapOptions {
            max_workers: 2,
            reset_cache: false,
            watch: false,
            watchman: false,
        }
    }

    #[test]
    fn test_file_index_is_sorted_and_deduplicated() {
        let index = FileIndex::new(vec![
            PathBuf::from("/b"),
            PathBuf::from("/a"),
            PathBuf::from("/b"),
        ]);
        assert_eq!(index.files(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(index.contains(Path::new("/b")));
        assert!(!index.contains(Path::new("/c")));
    }

    #[tokio::test]
    async fn test_walk_skips_ignored_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::create_dir_all(temp.path().join("node_modules").join("dep")).unwrap();
        std::fs::write(temp.path().join("src").join("app.test.js"), "").unwrap();
        std::fs::write(temp.path().join("node_modules").join("dep").join("x.js"), "").unwrap();

        let config = ProjectConfig::new("web", temp.path());
        let haste_map = WalkHasteMapFactory.create(&config, &options()).unwrap();
        let index = haste_map.build().await.unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(&temp.path().join("src").join("app.test.js")));
    }

    #[tokio::test]
    async fn test_missing_root_builds_empty_index() {
        let temp = TempDir::new().unwrap();
        let mut config = ProjectConfig::new("ghost", temp.path());
        config.roots = vec![temp.path().join("missing")];
        let index = WalkHasteMap::new(&config, &options())
            .unwrap()
            .build()
            .await
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_invalid_ignore_pattern_is_reported() {
        let mut config = ProjectConfig::new("bad", "/tmp");
        config.path_ignore_patterns = vec!["[".to_string()];
        let err = WalkHasteMap::new(&config, &options()).unwrap_err();
        assert!(matches!(err, RunError::HasteMap { .. }));
    }
}
