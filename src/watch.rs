//! Watch mode: re-run tests whenever files under a project root change.
//!
//! The controller owns the process once started. It only ever returns with an error.

use crate::changed_files::{ChangedFilesPromise, ChangedFilesProvider};
use crate::cli::OutputSink;
use crate::config::{GlobalConfig, ProjectConfig};
use crate::context::Context;
use crate::engine::{
    completion_channel, AggregatedResult, ExecutionEngine, RunRequest, StartRunHandle, TestWatcher,
};
use crate::error::RunError;
use crate::haste::{build_glob_set, HasteMap};
use async_trait::async_trait;
use futures::future::try_join_all;
use globset::GlobSet;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use owo_colors::OwoColorize;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything the controller takes over from the dispatcher.
pub struct WatchSession {
    pub contexts: Vec<Context>,
    pub global_config: GlobalConfig,
    pub project_configs: Vec<ProjectConfig>,
    pub output: OutputSink,
    pub haste_maps: Vec<Arc<dyn HasteMap>>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("contexts", &self.contexts)
            .field("global_config", &self.global_config)
            .field("haste_maps", &self.haste_maps.len())
            .finish()
    }
}

#[async_trait]
pub trait WatchController: Send + Sync {
    async fn start(&self, session: WatchSession) -> Result<Infallible, RunError>;
}

/// Filesystem-notification watcher that re-runs the engine after a quiet period.
pub struct NotifyWatchController {
    engine: Arc<dyn ExecutionEngine>,
    changed_files: Arc<dyn ChangedFilesProvider>,
    debounce: Duration,
}

impl NotifyWatchController {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        changed_files: Arc<dyn ChangedFilesProvider>,
    ) -> Self {
        Self {
            engine,
            changed_files,
            debounce: Duration::from_millis(100),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    async fn run_once(
        &self,
        contexts: Vec<Context>,
        session: &WatchSession,
    ) -> Result<Option<AggregatedResult>, RunError> {
        let (on_complete, completion) = completion_channel();
        let changed_files = ChangedFilesPromise::start(
            self.changed_files.clone(),
            &session.global_config,
            &session.project_configs,
        );
        self.engine
            .run(RunRequest {
                contexts,
                global_config: session.global_config.clone(),
                changed_files,
                watcher: TestWatcher::new(true),
                on_complete,
                start_run: StartRunHandle::new(),
                output: session.output.clone(),
            })
            .await?;
        Ok(completion.wait().await)
    }
}

#[async_trait]
impl WatchController for NotifyWatchController {
    async fn start(&self, session: WatchSession) -> Result<Infallible, RunError> {
        let ignore = ignore_set(&session.project_configs)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver lives as long as the controller.
            let _ = tx.send(res);
        })?;
        let roots: BTreeSet<PathBuf> = session
            .project_configs
            .iter()
            .flat_map(|c| c.roots.iter().cloned())
            .filter(|root| root.is_dir())
            .collect();
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        info!(roots = roots.len(), "Watching project roots");

        let result = self.run_once(session.contexts.clone(), &session).await?;
        report(&session.output, result.as_ref())?;

        loop {
            let mut batch = BTreeSet::new();
            match rx.recv().await {
                Some(Ok(event)) => batch.extend(relevant_paths(event, &ignore)),
                Some(Err(e)) => warn!("Watch error: {}", e),
                None => return Err(RunError::Watch("file watcher stopped".to_string())),
            }

            // Drain until the tree has been quiet for one debounce window.
            while let Ok(next) = tokio::time::timeout(self.debounce, rx.recv()).await {
                match next {
                    Some(Ok(event)) => batch.extend(relevant_paths(event, &ignore)),
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => return Err(RunError::Watch("file watcher stopped".to_string())),
                }
            }

            if batch.is_empty() {
                continue;
            }
            debug!(changed = batch.len(), "Change batch ready");

            let contexts = rebuild_contexts(&session.project_configs, &session.haste_maps).await?;
            let result = self.run_once(contexts, &session).await?;
            report(&session.output, result.as_ref())?;
        }
    }
}

/// Rebuild every file index with the retained builders, keeping project order.
pub async fn rebuild_contexts(
    configs: &[ProjectConfig],
    haste_maps: &[Arc<dyn HasteMap>],
) -> Result<Vec<Context>, RunError> {
    let indexes = try_join_all(haste_maps.iter().map(|map| map.build())).await?;
    Ok(configs
        .iter()
        .cloned()
        .zip(indexes)
        .map(|(config, file_index)| Context { config, file_index })
        .collect())
}

fn ignore_set(configs: &[ProjectConfig]) -> Result<GlobSet, RunError> {
    let patterns: Vec<String> = configs
        .iter()
        .flat_map(|c| c.path_ignore_patterns.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    build_glob_set(&patterns).map_err(RunError::Watch)
}

/// Paths from `event` that should trigger a re-run.
fn relevant_paths(event: Event, ignore: &GlobSet) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
            .paths
            .into_iter()
            .filter(|path| !ignore.is_match(path))
            .collect(),
        _ => Vec::new(),
    }
}

fn report(output: &OutputSink, result: Option<&AggregatedResult>) -> Result<(), RunError> {
    match result {
        Some(result) if !result.success => warn!(
            failed = result.num_failed_test_suites,
            "Run finished with failures"
        ),
        _ => {}
    }
    output.write_line(
        "Watching for file changes. Press Ctrl+C to exit."
            .dimmed()
            .to_string(),
    )?;
    Ok(())
}
