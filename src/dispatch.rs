//! One-shot or watch: hands the built contexts to the right collaborator.

use crate::changed_files::ChangedFilesPromise;
use crate::cli::{print_pre_run_message, OutputSink};
use crate::config::ResolvedConfigs;
use crate::context::BuiltContexts;
use crate::engine::{
    completion_channel, AggregatedResult, ExecutionEngine, RunRequest, StartRunHandle, TestWatcher,
};
use crate::error::RunError;
use crate::outcome::Outcome;
use crate::prompt::Prompter;
use crate::watch::{WatchController, WatchSession};
use tracing::{debug, info, warn};

pub const DEPRECATION_PROMPT: &str =
    "Your configuration uses deprecated options (see above). Continue in watch mode?";

/// What the dispatcher works with.
#[derive(Debug)]
pub struct DispatchInput {
    pub built: BuiltContexts,
    pub resolved: ResolvedConfigs,
    pub changed_files: ChangedFilesPromise,
    pub output: OutputSink,
}

pub struct RunModeDispatcher<'a> {
    engine: &'a dyn ExecutionEngine,
    watch: &'a dyn WatchController,
    prompter: &'a dyn Prompter,
}

impl<'a> RunModeDispatcher<'a> {
    pub fn new(
        engine: &'a dyn ExecutionEngine,
        watch: &'a dyn WatchController,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            engine,
            watch,
            prompter,
        }
    }

    /// Run once (possibly restarted by the engine) or hand over to the watch controller.
    ///
    /// `Continue` carries the engine's result, `None` when it never completed.
    pub async fn dispatch(
        &self,
        input: DispatchInput,
    ) -> Result<Outcome<Option<AggregatedResult>>, RunError> {
        if input.resolved.global_config.is_watching() {
            self.watch_mode(input).await
        } else {
            self.one_shot(input).await.map(Outcome::Continue)
        }
    }

    async fn one_shot(&self, input: DispatchInput) -> Result<Option<AggregatedResult>, RunError> {
        let DispatchInput {
            built,
            resolved,
            changed_files,
            output,
        } = input;
        let global = resolved.global_config;
        let start_run = StartRunHandle::new();

        loop {
            if !global.list_tests {
                print_pre_run_message(&output)?;
            }

            let (on_complete, completion) = completion_channel();
            self.engine
                .run(RunRequest {
                    contexts: built.contexts.clone(),
                    global_config: global.clone(),
                    changed_files: changed_files.clone(),
                    watcher: TestWatcher::new(false),
                    on_complete,
                    start_run: start_run.clone(),
                    output: output.clone(),
                })
                .await?;
            let result = completion.wait().await;

            if start_run.take_request() {
                info!("Engine requested another run");
                continue;
            }
            debug!(has_result = result.is_some(), "One-shot run complete");
            return Ok(result);
        }
    }

    async fn watch_mode(
        &self,
        input: DispatchInput,
    ) -> Result<Outcome<Option<AggregatedResult>>, RunError> {
        if input.resolved.has_deprecation_warnings {
            match self.prompter.confirm(DEPRECATION_PROMPT).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Watch mode declined after deprecation warnings");
                    return Ok(Outcome::Exit(0));
                }
                Err(e) => {
                    warn!("No answer to deprecation prompt: {}", e);
                    return Ok(Outcome::Exit(0));
                }
            }
        }

        let DispatchInput {
            built,
            resolved,
            output,
            ..
        } = input;
        let session = WatchSession {
            contexts: built.contexts,
            global_config: resolved.global_config,
            project_configs: resolved.project_configs,
            output,
            haste_maps: built.haste_maps,
        };
        match self.watch.start(session).await {
            Ok(never) => match never {},
            Err(e) => Err(e),
        }
    }
}
