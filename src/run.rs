//! Top-level driver: from raw arguments to an exit plan.

use crate::changed_files::{ChangedFilesPromise, ChangedFilesProvider, GitChangedFiles};
use crate::cli::{
    build_argv, format_config_dump, format_project_table, report_fatal, OutputSink,
    ValidatedOptions,
};
use crate::config::{get_configs, ConfigReader, ResolvedConfigs, TomlConfigReader};
use crate::context::build_contexts;
use crate::dispatch::{DispatchInput, RunModeDispatcher};
use crate::engine::{CommandEngine, ExecutionEngine};
use crate::error::RunError;
use crate::exit::ExitPlan;
use crate::haste::{HasteMapFactory, WalkHasteMapFactory};
use crate::outcome::Outcome;
use crate::projects::get_projects;
use crate::prompt::{Prompter, TerminalPrompter};
use crate::runner::{delegate, select_runner, Runner};
use crate::watch::{NotifyWatchController, WatchController};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The pluggable parts of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub config_reader: Arc<dyn ConfigReader>,
    pub haste_maps: Arc<dyn HasteMapFactory>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub watch: Arc<dyn WatchController>,
    pub changed_files: Arc<dyn ChangedFilesProvider>,
    pub prompter: Arc<dyn Prompter>,
    /// Replaces the stdout/stderr sink chosen from the flags
    pub output: Option<OutputSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        let engine: Arc<dyn ExecutionEngine> = Arc::new(CommandEngine);
        let changed_files: Arc<dyn ChangedFilesProvider> = Arc::new(GitChangedFiles);
        Self {
            config_reader: Arc::new(TomlConfigReader::new()),
            haste_maps: Arc::new(WalkHasteMapFactory),
            watch: Arc::new(NotifyWatchController::new(
                engine.clone(),
                changed_files.clone(),
            )),
            engine,
            changed_files,
            prompter: Arc::new(TerminalPrompter),
            output: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Parse `raw_args` (program name first) and run.
pub async fn run<I, T>(
    raw_args: I,
    explicit_project: Option<&Path>,
    collaborators: &Collaborators,
) -> anyhow::Result<ExitPlan>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let options = match build_argv(raw_args) {
        Ok(Outcome::Continue(options)) => options,
        Ok(Outcome::Exit(code)) => return Ok(ExitPlan::early(code)),
        Err(e) => {
            let err = anyhow::Error::new(e);
            report_fatal(&err);
            return Err(err);
        }
    };
    run_cli(options, explicit_project, collaborators).await
}

/// Run with already validated options.
///
/// A failure is printed (cleared status lines, full cause chain) and also returned.
pub async fn run_cli(
    options: ValidatedOptions,
    explicit_project: Option<&Path>,
    collaborators: &Collaborators,
) -> anyhow::Result<ExitPlan> {
    match orchestrate(&options, explicit_project, collaborators).await {
        Ok(plan) => Ok(plan),
        Err(e) => {
            let err = anyhow::Error::new(e);
            report_fatal(&err);
            Err(err)
        }
    }
}

async fn orchestrate(
    options: &ValidatedOptions,
    explicit_project: Option<&Path>,
    collaborators: &Collaborators,
) -> Result<ExitPlan, RunError> {
    let started = Instant::now();
    let roots = get_projects(options, explicit_project);

    if let [root] = roots.as_slice() {
        if let Runner::Delegating(binary) = select_runner(root) {
            let code = delegate(&binary, &options.raw_args).await?;
            return Ok(ExitPlan::early(code));
        }
    }

    let output = collaborators
        .output
        .clone()
        .unwrap_or_else(|| OutputSink::for_flags(options.json, options.use_stderr));

    let resolved = get_configs(collaborators.config_reader.as_ref(), &roots, options).await?;

    if options.debug || options.show_config {
        if options.debug {
            output.write_line(format_project_table(&resolved))?;
        }
        output.write_line(format_config_dump(&resolved))?;
        if options.show_config {
            return Ok(ExitPlan::early(0));
        }
    }

    if options.clear_cache {
        clear_caches(&resolved, &output).await?;
        return Ok(ExitPlan::early(0));
    }

    let changed_files = ChangedFilesPromise::start(
        collaborators.changed_files.clone(),
        &resolved.global_config,
        &resolved.project_configs,
    );
    let built = build_contexts(
        collaborators.haste_maps.as_ref(),
        &resolved.project_configs,
        &resolved.global_config,
    )
    .await?;

    let global = resolved.global_config.clone();
    let dispatcher = RunModeDispatcher::new(
        collaborators.engine.as_ref(),
        collaborators.watch.as_ref(),
        collaborators.prompter.as_ref(),
    );
    let outcome = dispatcher
        .dispatch(DispatchInput {
            built,
            resolved,
            changed_files,
            output,
        })
        .await?;

    let plan = match outcome {
        Outcome::Exit(code) => ExitPlan::early(code),
        Outcome::Continue(result) => ExitPlan::for_result(result.as_ref(), &global),
    };
    info!(
        code = plan.code,
        force = plan.force,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run complete"
    );
    Ok(plan)
}

/// Remove every project's cache directory. Missing directories count as cleared.
async fn clear_caches(resolved: &ResolvedConfigs, output: &OutputSink) -> Result<(), RunError> {
    for config in &resolved.project_configs {
        let dir: &PathBuf = &config.cache_directory;
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!(project = %config.name, "Removed cache directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RunError::CacheDirectory {
                    path: dir.clone(),
                    source,
                })
            }
        }
        output.write_line(format!("Cleared {}", dir.display()))?;
    }
    Ok(())
}
