//! Argv builder: turns raw process arguments into validated, immutable run options.

use crate::cli::parse::Cli;
use crate::error::ArgvValidationError;
use crate::outcome::Outcome;
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// How the user pointed at a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigArg {
    /// `--config path/to/jig.toml`
    Path(PathBuf),
    /// `--config '{"test_failure_exit_code": 3}'`
    Inline(String),
}

/// Logging flags, kept apart from run options so the binary can build its subscriber first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogArgs {
    pub verbose: bool,
    pub level: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub file: Option<PathBuf>,
}

/// Command-line options after validation. Never mutated once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedOptions {
    /// Original arguments (without the program name), replayed when delegating to another runner.
    pub raw_args: Vec<OsString>,
    pub test_path_pattern: Vec<String>,
    pub config: Option<ConfigArg>,
    pub projects: Vec<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub watch: bool,
    pub watch_all: bool,
    pub watchman: bool,
    pub clear_cache: bool,
    pub json: bool,
    pub use_stderr: bool,
    pub debug: bool,
    pub show_config: bool,
    pub list_tests: bool,
    pub only_changed: bool,
    pub changed_since: Option<String>,
    pub last_commit: bool,
    pub changed_files_with_ancestor: bool,
    pub max_workers: Option<usize>,
    pub cache: Option<bool>,
    pub force_exit: bool,
    pub test_failure_exit_code: Option<i32>,
    pub log: LogArgs,
}

/// Parse and validate raw arguments (program name first).
///
/// `--help` and `--version` print and return `Outcome::Exit(0)`.
pub fn build_argv<I, T>(raw_args: I) -> Result<Outcome<ValidatedOptions>, ArgvValidationError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw: Vec<OsString> = raw_args.into_iter().map(Into::into).collect();
    let cli = match Cli::try_parse_from(raw.iter().cloned()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                return Ok(Outcome::Exit(0));
            }
            _ => return Err(err.into()),
        },
    };

    let mut options = ValidatedOptions::try_from(cli)?;
    options.raw_args = raw.into_iter().skip(1).collect();
    Ok(Outcome::Continue(options))
}

impl TryFrom<Cli> for ValidatedOptions {
    type Error = ArgvValidationError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let config = cli.config.as_deref().map(parse_config_arg).transpose()?;

        let max_workers = if cli.run_in_band {
            Some(1)
        } else {
            cli.max_workers.as_deref().map(parse_max_workers).transpose()?
        };

        if cli.only_changed && cli.watch_all {
            return Err(ArgvValidationError::Conflicting {
                first: "onlyChanged",
                second: "watchAll",
            });
        }

        let only_changed = cli.only_changed
            || cli.changed_since.is_some()
            || cli.last_commit
            || (cli.watch && !cli.watch_all);

        if only_changed && cli.watch_all {
            let first = if cli.changed_since.is_some() {
                "changedSince"
            } else {
                "lastCommit"
            };
            return Err(ArgvValidationError::Conflicting {
                first,
                second: "watchAll",
            });
        }

        let test_failure_exit_code = cli
            .test_failure_exit_code
            .map(check_exit_code)
            .transpose()?;

        let cache = if cli.no_cache {
            Some(false)
        } else if cli.cache {
            Some(true)
        } else {
            None
        };

        Ok(Self {
            raw_args: Vec::new(),
            test_path_pattern: cli.test_path_pattern,
            config,
            projects: cli.projects,
            root_dir: cli.root_dir,
            watch: cli.watch,
            watch_all: cli.watch_all,
            watchman: cli.watchman,
            clear_cache: cli.clear_cache,
            json: cli.json,
            use_stderr: cli.use_stderr,
            debug: cli.debug,
            show_config: cli.show_config,
            list_tests: cli.list_tests,
            only_changed,
            changed_since: cli.changed_since,
            last_commit: cli.last_commit,
            changed_files_with_ancestor: cli.changed_files_with_ancestor,
            max_workers,
            cache,
            force_exit: cli.force_exit,
            test_failure_exit_code,
            log: LogArgs {
                verbose: cli.verbose,
                level: cli.log_level,
                format: cli.log_format,
                output: cli.log_output,
                file: cli.log_file,
            },
        })
    }
}

fn parse_config_arg(value: &str) -> Result<ConfigArg, ArgvValidationError> {
    let trimmed = value.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
            ArgvValidationError::InvalidOption {
                option: "config".to_string(),
                reason: format!("not a valid JSON object: {}", e),
            }
        })?;
        return Ok(ConfigArg::Inline(trimmed.to_string()));
    }

    let path = PathBuf::from(value);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") | Some("json") => Ok(ConfigArg::Path(path)),
        _ => Err(ArgvValidationError::InvalidOption {
            option: "config".to_string(),
            reason: "requires a JSON string literal, or a file path ending in .toml or .json"
                .to_string(),
        }),
    }
}

fn parse_max_workers(value: &str) -> Result<usize, ArgvValidationError> {
    let invalid = |reason: &str| ArgvValidationError::InvalidOption {
        option: "maxWorkers".to_string(),
        reason: format!("{} (got '{}')", reason, value),
    };

    if let Some(percent) = value.strip_suffix('%') {
        let percent: usize = percent
            .trim()
            .parse()
            .map_err(|_| invalid("percentage must be a whole number"))?;
        if percent == 0 || percent > 100 {
            return Err(invalid("percentage must be between 1% and 100%"));
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        return Ok((cpus * percent / 100).max(1));
    }

    let workers: usize = value
        .trim()
        .parse()
        .map_err(|_| invalid("must be a positive integer or a percentage"))?;
    if workers == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(workers)
}

/// Process exit statuses are a single byte.
fn check_exit_code(code: i32) -> Result<i32, ArgvValidationError> {
    if (0..=255).contains(&code) {
        Ok(code)
    } else {
        Err(ArgvValidationError::InvalidOption {
            option: "testFailureExitCode".to_string(),
            reason: format!("must be between 0 and 255 (got {})", code),
        })
    }
}
