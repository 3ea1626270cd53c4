//! CLI parse: clap types for Jig. No behavior; definitions only.

use clap::Parser;
use std::path::PathBuf;

/// Jig - run tests across one or many projects
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "jig", version)]
#[command(about = "Run tests across one or many projects")]
pub struct Cli {
    /// Test path patterns forwarded to the execution engine
    #[arg(value_name = "TEST_PATH_PATTERN")]
    pub test_path_pattern: Vec<String>,

    /// Path to a config file, or a JSON object literal
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Run tests for several projects at once
    #[arg(long, num_args = 1.., value_name = "PATH")]
    pub projects: Vec<PathBuf>,

    /// Root directory used when resolving relative config paths
    #[arg(long = "rootDir")]
    pub root_dir: Option<PathBuf>,

    /// Watch files and rerun tests related to changed files
    #[arg(long)]
    pub watch: bool,

    /// Watch files and rerun all tests when something changes
    #[arg(long = "watchAll")]
    pub watch_all: bool,

    /// Use the watchman service for file crawling
    #[arg(long)]
    pub watchman: bool,

    /// Delete the cache directory of every project, then exit
    #[arg(long = "clearCache")]
    pub clear_cache: bool,

    /// Print test results as JSON; moves all other output to stderr
    #[arg(long)]
    pub json: bool,

    /// Write primary output to stderr
    #[arg(long = "useStderr")]
    pub use_stderr: bool,

    /// Print debugging info about the resolved configuration, then run
    #[arg(long)]
    pub debug: bool,

    /// Print the resolved configuration and exit
    #[arg(long = "showConfig")]
    pub show_config: bool,

    /// List the test files that would run, then exit
    #[arg(long = "listTests")]
    pub list_tests: bool,

    /// Only run tests related to files changed since the last commit
    #[arg(long = "onlyChanged", short = 'o')]
    pub only_changed: bool,

    /// Only run tests related to files changed since the given ref
    #[arg(long = "changedSince", value_name = "REF")]
    pub changed_since: Option<String>,

    /// Only run tests related to files changed in the last commit
    #[arg(long = "lastCommit")]
    pub last_commit: bool,

    /// Include files changed in the parent commit as well
    #[arg(long = "changedFilesWithAncestor")]
    pub changed_files_with_ancestor: bool,

    /// Maximum number of workers (count or percentage such as 50%)
    #[arg(long = "maxWorkers", short = 'w', conflicts_with = "run_in_band")]
    pub max_workers: Option<String>,

    /// Run everything in a single worker
    #[arg(long = "runInBand", short = 'i')]
    pub run_in_band: bool,

    /// Use the transform cache
    #[arg(long, overrides_with = "no_cache")]
    pub cache: bool,

    /// Disable the cache; file indexes are rebuilt from scratch
    #[arg(long = "no-cache", overrides_with = "cache")]
    pub no_cache: bool,

    /// Exit immediately after tests complete instead of draining background work
    #[arg(long = "forceExit")]
    pub force_exit: bool,

    /// Exit code used when tests fail
    #[arg(long = "testFailureExitCode", value_name = "CODE")]
    pub test_failure_exit_code: Option<i32>,

    /// Enable verbose logging (default: off)
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
