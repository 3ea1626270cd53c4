//! Per-project contexts: a project configuration plus its built file index.

use crate::config::{GlobalConfig, ProjectConfig};
use crate::error::RunError;
use crate::haste::{FileIndex, HasteMap, HasteMapFactory, HasteMapOptions};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything the execution engine needs about one project.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub config: ProjectConfig,
    pub file_index: FileIndex,
}

/// Contexts in project order, with the builders that produced them.
///
/// Watch mode keeps the builders so it can rebuild indexes after file changes.
pub struct BuiltContexts {
    pub contexts: Vec<Context>,
    pub haste_maps: Vec<Arc<dyn HasteMap>>,
}

impl std::fmt::Debug for BuiltContexts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltContexts")
            .field("contexts", &self.contexts)
            .field("haste_maps", &self.haste_maps.len())
            .finish()
    }
}

/// Builder options for `config` under the run-wide `global` settings.
pub fn haste_map_options(global: &GlobalConfig, config: &ProjectConfig) -> HasteMapOptions {
    HasteMapOptions {
        max_workers: global.max_workers,
        reset_cache: !config.cache,
        watch: global.is_watching(),
        watchman: global.watchman,
    }
}

/// Build one context per project, all projects concurrently.
///
/// Each project's cache directory is created first. The first failure fails the whole build;
/// the output order matches `configs`.
pub async fn build_contexts(
    factory: &dyn HasteMapFactory,
    configs: &[ProjectConfig],
    global: &GlobalConfig,
) -> Result<BuiltContexts, RunError> {
    let started = Instant::now();
    let built = try_join_all(configs.iter().map(|config| build_one(factory, config, global))).await?;
    let (contexts, haste_maps): (Vec<_>, Vec<_>) = built.into_iter().unzip();

    info!(
        projects = contexts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built test contexts"
    );
    Ok(BuiltContexts {
        contexts,
        haste_maps,
    })
}

async fn build_one(
    factory: &dyn HasteMapFactory,
    config: &ProjectConfig,
    global: &GlobalConfig,
) -> Result<(Context, Arc<dyn HasteMap>), RunError> {
    tokio::fs::create_dir_all(&config.cache_directory)
        .await
        .map_err(|source| RunError::CacheDirectory {
            path: config.cache_directory.clone(),
            source,
        })?;

    let haste_map = factory.create(config, &haste_map_options(global, config))?;
    let file_index = haste_map.build().await?;
    debug!(project = %config.name, files = file_index.len(), "File index ready");

    Ok((
        Context {
            config: config.clone(),
            file_index,
        },
        haste_map,
    ))
}
