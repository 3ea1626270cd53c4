//! Shared fixtures for integration tests
//!
//! Fake collaborators that record how they were used, plus helpers for laying out project
//! trees in a temp directory.

use async_trait::async_trait;
use jig::changed_files::{ChangedFiles, ChangedFilesProvider, ChangedFilesQuery};
use jig::cli::{CapturedOutput, OutputSink};
use jig::config::TomlConfigReader;
use jig::engine::{AggregatedResult, ExecutionEngine, RunRequest};
use jig::haste::WalkHasteMapFactory;
use jig::prompt::Prompter;
use jig::watch::{WatchController, WatchSession};
use jig::{Collaborators, RunError};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the fake engine saw on each call.
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub projects: Vec<String>,
    pub files: usize,
    pub only_changed: bool,
}

/// Engine that completes every run with a fixed verdict.
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    success: bool,
}

impl FakeEngine {
    pub fn new(success: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            success,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ExecutionEngine for FakeEngine {
    async fn run(&self, request: RunRequest) -> Result<(), RunError> {
        self.calls.lock().push(EngineCall {
            projects: request
                .contexts
                .iter()
                .map(|c| c.config.name.clone())
                .collect(),
            files: request.contexts.iter().map(|c| c.file_index.len()).sum(),
            only_changed: request.global_config.only_changed,
        });
        let result = if self.success {
            AggregatedResult::passed(1)
        } else {
            AggregatedResult::failed(1, 1)
        };
        request.on_complete.complete(result);
        Ok(())
    }
}

/// Watch controller that only counts how often it was started.
#[derive(Default)]
pub struct FakeWatch {
    pub starts: Mutex<usize>,
}

#[async_trait]
impl WatchController for FakeWatch {
    async fn start(&self, _session: WatchSession) -> Result<Infallible, RunError> {
        *self.starts.lock() += 1;
        Err(RunError::Watch("fake watcher stops immediately".to_string()))
    }
}

/// Prompter with a canned answer.
pub struct FakePrompter {
    pub answer: bool,
    pub asked: Mutex<usize>,
}

#[async_trait]
impl Prompter for FakePrompter {
    async fn confirm(&self, _message: &str) -> Result<bool, RunError> {
        *self.asked.lock() += 1;
        Ok(self.answer)
    }
}

/// Changed-files provider reporting nothing changed in one fake repository.
pub struct NoChanges;

#[async_trait]
impl ChangedFilesProvider for NoChanges {
    async fn changed_files(
        &self,
        roots: &[PathBuf],
        _query: &ChangedFilesQuery,
    ) -> Result<ChangedFiles, RunError> {
        Ok(ChangedFiles {
            repos: roots.iter().take(1).cloned().collect::<BTreeSet<_>>(),
            files: BTreeSet::new(),
        })
    }
}

/// Collaborators wired to fakes, with the real config reader and file crawler.
pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub watch: Arc<FakeWatch>,
    pub prompter: Arc<FakePrompter>,
    pub output: CapturedOutput,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new(success: bool, prompt_answer: bool) -> Self {
        let engine = FakeEngine::new(success);
        let watch = Arc::new(FakeWatch::default());
        let prompter = Arc::new(FakePrompter {
            answer: prompt_answer,
            asked: Mutex::new(0),
        });
        let (sink, output) = OutputSink::capture();
        let collaborators = Collaborators {
            config_reader: Arc::new(TomlConfigReader::new()),
            haste_maps: Arc::new(WalkHasteMapFactory),
            engine: engine.clone(),
            watch: watch.clone(),
            changed_files: Arc::new(NoChanges),
            prompter: prompter.clone(),
            output: Some(sink),
        };
        Self {
            engine,
            watch,
            prompter,
            output,
            collaborators,
        }
    }
}

/// Write `contents` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// A project directory with a `jig.toml` keeping its cache inside the project.
pub fn project(dir: &Path, name: &str, extra: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    write_file(
        dir,
        "jig.toml",
        &format!(
            "name = \"{}\"\ncache_directory = \"<rootDir>/.jig-cache\"\n{}",
            name, extra
        ),
    );
    dir.to_path_buf()
}
