//! CLI domain: argument schema, validation, and terminal output only.
//! No orchestration; the run driver in `crate::run` consumes what this module builds.

mod argv;
mod output;
mod parse;

pub use argv::{build_argv, ConfigArg, LogArgs, ValidatedOptions};
pub use output::{
    clear_line, format_config_dump, format_project_table, print_deprecation,
    print_pre_run_message, report_fatal, CapturedOutput, OutputSink, PRE_RUN_MESSAGE,
};
pub use parse::Cli;
