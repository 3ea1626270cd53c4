//! Process exit handling.

use crate::cli::OutputSink;
use crate::config::GlobalConfig;
use crate::engine::AggregatedResult;
use tracing::debug;

/// Exit status for a finished run: 0 without a result or on success.
pub fn status_for(result: Option<&AggregatedResult>, global: &GlobalConfig) -> i32 {
    match result {
        Some(result) if !result.success => global.test_failure_exit_code,
        _ => 0,
    }
}

/// How the process should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPlan {
    pub code: i32,
    /// Terminate immediately instead of letting background work finish
    pub force: bool,
}

impl ExitPlan {
    /// Informational or early exit.
    pub fn early(code: i32) -> Self {
        Self { code, force: false }
    }

    pub fn for_result(result: Option<&AggregatedResult>, global: &GlobalConfig) -> Self {
        Self {
            code: status_for(result, global),
            force: global.force_exit,
        }
    }

    /// Flush `output`; with `force` the process ends here, otherwise the code is handed back so
    /// the caller can shut its runtime down first.
    pub fn finish(self, output: &OutputSink) -> i32 {
        if let Err(e) = output.flush() {
            debug!("Failed to flush output: {}", e);
        }
        if self.force {
            std::process::exit(self.code);
        }
        self.code
    }
}
