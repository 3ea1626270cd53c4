//! Test execution hand-off.
//!
//! The orchestrator never runs tests itself. It hands an [`ExecutionEngine`] a [`RunRequest`]
//! and learns the outcome through a one-shot completion channel. An engine that finishes
//! without completing (for example `--listTests`) reports "no result", which exits 0.

use crate::changed_files::ChangedFilesPromise;
use crate::cli::OutputSink;
use crate::config::{GlobalConfig, ProjectConfig};
use crate::context::Context;
use crate::error::RunError;
use crate::haste::build_glob_set;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Pass/fail summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub success: bool,
    pub num_total_test_suites: usize,
    pub num_passed_test_suites: usize,
    pub num_failed_test_suites: usize,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AggregatedResult {
    pub fn passed(num_total_test_suites: usize) -> Self {
        Self {
            success: true,
            num_total_test_suites,
            num_passed_test_suites: num_total_test_suites,
            num_failed_test_suites: 0,
            start_time: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn failed(num_total_test_suites: usize, num_failed_test_suites: usize) -> Self {
        Self {
            success: false,
            num_total_test_suites,
            num_passed_test_suites: num_total_test_suites.saturating_sub(num_failed_test_suites),
            num_failed_test_suites,
            start_time: Utc::now(),
            duration_ms: 0,
        }
    }
}

/// Tells the engine whether a watch controller owns the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestWatcher {
    is_watching: bool,
}

impl TestWatcher {
    pub fn new(is_watching: bool) -> Self {
        Self { is_watching }
    }

    pub fn is_watching(&self) -> bool {
        self.is_watching
    }
}

/// Engine side of the completion channel. Dropping it without completing means "no result".
#[derive(Debug)]
pub struct CompletionSender(oneshot::Sender<AggregatedResult>);

impl CompletionSender {
    pub fn complete(self, result: AggregatedResult) {
        // The receiver only goes away once the run is over.
        let _ = self.0.send(result);
    }
}

/// Orchestrator side of the completion channel.
#[derive(Debug)]
pub struct CompletionReceiver(oneshot::Receiver<AggregatedResult>);

impl CompletionReceiver {
    pub async fn wait(self) -> Option<AggregatedResult> {
        self.0.await.ok()
    }
}

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender(tx), CompletionReceiver(rx))
}

/// Lets an engine ask for another full run once the current one returns.
#[derive(Debug, Clone, Default)]
pub struct StartRunHandle(Arc<AtomicBool>);

impl StartRunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a re-run was requested since the last call; clears the request.
    pub fn take_request(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Everything one engine invocation receives.
#[derive(Debug)]
pub struct RunRequest {
    pub contexts: Vec<Context>,
    pub global_config: GlobalConfig,
    pub changed_files: ChangedFilesPromise,
    pub watcher: TestWatcher,
    pub on_complete: CompletionSender,
    pub start_run: StartRunHandle,
    pub output: OutputSink,
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<(), RunError>;
}

/// Runs each project's `test_command` with its selected test files appended.
///
/// Human-facing output goes to the request's sink; `--json` payloads always go to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEngine;

/// Test files picked for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSelection {
    pub project: String,
    pub files: Vec<PathBuf>,
}

#[async_trait]
impl ExecutionEngine for CommandEngine {
    async fn run(&self, request: RunRequest) -> Result<(), RunError> {
        let RunRequest {
            contexts,
            global_config,
            changed_files,
            watcher,
            on_complete,
            start_run: _,
            output,
        } = request;

        let start_time = Utc::now();
        let started = Instant::now();

        let changed = changed_files.join().await?;
        if let Some(changed) = &changed {
            if changed.repos.is_empty() {
                return Err(RunError::ChangedFiles(
                    "--onlyChanged requires the project to be inside a git repository".to_string(),
                ));
            }
        }

        let mut selections = Vec::with_capacity(contexts.len());
        for context in &contexts {
            let mut files = select_test_files(context, &global_config.test_path_pattern)?;
            if let Some(changed) = &changed {
                files.retain(|file| changed.files.contains(file));
            }
            selections.push(ProjectSelection {
                project: context.config.name.clone(),
                files,
            });
        }

        if global_config.list_tests {
            write_test_list(&output, &selections, global_config.json)?;
            return Ok(());
        }

        let total: usize = selections.iter().map(|s| s.files.len()).sum();
        if total == 0 {
            let message = if global_config.only_changed {
                "No tests found related to files changed since last commit."
            } else {
                "No tests found, exiting with code 1"
            };
            output.write_line(message)?;
            let mut result = if global_config.only_changed {
                AggregatedResult::passed(0)
            } else {
                AggregatedResult::failed(0, 0)
            };
            result.start_time = start_time;
            on_complete.complete(result);
            return Ok(());
        }

        let mut failed = 0;
        for (context, selection) in contexts.iter().zip(&selections) {
            if selection.files.is_empty() {
                continue;
            }
            if !run_project(&context.config, &selection.files, &output).await? {
                failed += selection.files.len();
            }
        }

        let mut result = if failed == 0 {
            AggregatedResult::passed(total)
        } else {
            AggregatedResult::failed(total, failed)
        };
        result.start_time = start_time;
        result.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            total,
            failed,
            watching = watcher.is_watching(),
            elapsed_ms = result.duration_ms,
            "Run finished"
        );
        write_summary(&output, &result, global_config.json)?;
        on_complete.complete(result);
        Ok(())
    }
}

/// Indexed files matching the project's `test_match` globs and, when given, containing one of
/// the positional path patterns.
pub fn select_test_files(
    context: &Context,
    path_patterns: &[String],
) -> Result<Vec<PathBuf>, RunError> {
    let config = &context.config;
    let test_match = build_glob_set(&config.test_match).map_err(|reason| {
        RunError::Configuration(format!("project '{}' test_match: {}", config.name, reason))
    })?;

    Ok(context
        .file_index
        .files()
        .iter()
        .filter(|file| test_match.is_match(relative_to(file, &config.root_dir)))
        .filter(|file| {
            path_patterns.is_empty() || {
                let shown = file.to_string_lossy();
                path_patterns.iter().any(|p| shown.contains(p.as_str()))
            }
        })
        .cloned()
        .collect())
}

fn relative_to<'a>(file: &'a Path, root: &Path) -> &'a Path {
    file.strip_prefix(root).unwrap_or(file)
}

/// Run one project's command. `Ok(false)` when the command ran and failed.
async fn run_project(
    config: &ProjectConfig,
    files: &[PathBuf],
    output: &OutputSink,
) -> Result<bool, RunError> {
    let Some((program, args)) = config.test_command.as_deref().and_then(|c| c.split_first()) else {
        warn!(project = %config.name, files = files.len(), "No test_command configured");
        output.write_line(format!(
            "{} project {} has {} test file(s) but no test_command; skipping",
            "warning:".yellow(),
            config.name,
            files.len()
        ))?;
        return Ok(true);
    };

    debug!(project = %config.name, program = %program, files = files.len(), "Spawning test command");
    let result = Command::new(program)
        .args(args)
        .args(files)
        .current_dir(&config.root_dir)
        .output()
        .await
        .map_err(|e| RunError::Engine(format!("failed to run '{}' for {}: {}", program, config.name, e)))?;

    for stream in [&result.stdout, &result.stderr] {
        for line in String::from_utf8_lossy(stream).lines() {
            output.write_line(line)?;
        }
    }

    let passed = result.status.success();
    let label = if passed {
        " PASS ".black().on_green().to_string()
    } else {
        " FAIL ".black().on_red().to_string()
    };
    output.write_line(format!("{} {}", label, config.name))?;
    Ok(passed)
}

fn write_test_list(
    output: &OutputSink,
    selections: &[ProjectSelection],
    json: bool,
) -> Result<(), RunError> {
    let files: Vec<&PathBuf> = selections.iter().flat_map(|s| s.files.iter()).collect();
    if json {
        let rendered = serde_json::to_string(&files)
            .map_err(|e| RunError::Engine(format!("failed to serialize test list: {}", e)))?;
        OutputSink::stdout().write_line(rendered)?;
    } else {
        for file in files {
            output.write_line(file.display().to_string())?;
        }
    }
    Ok(())
}

fn write_summary(
    output: &OutputSink,
    result: &AggregatedResult,
    json: bool,
) -> Result<(), RunError> {
    if json {
        let rendered = serde_json::to_string(result)
            .map_err(|e| RunError::Engine(format!("failed to serialize results: {}", e)))?;
        OutputSink::stdout().write_line(rendered)?;
        return Ok(());
    }

    let failed = if result.num_failed_test_suites > 0 {
        format!("{} failed, ", result.num_failed_test_suites).red().bold().to_string()
    } else {
        String::new()
    };
    output.write_line(format!(
        "Test Suites: {}{} passed, {} total",
        failed,
        result.num_passed_test_suites.green().bold(),
        result.num_total_test_suites
    ))?;
    output.write_line(format!("Time:        {:.3}s", result.duration_ms as f64 / 1000.0))?;
    Ok(())
}
