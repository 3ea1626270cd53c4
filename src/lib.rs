//! Jig: run orchestration for a multi-project test runner
//!
//! Turns a command line into a finished test run: validated options, project roots, one
//! configuration per project, concurrently built file indexes, an optional changed-files
//! lookup, and finally a one-shot run or a watch session handed to pluggable collaborators.

pub mod changed_files;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod exit;
pub mod haste;
pub mod logging;
pub mod outcome;
pub mod projects;
pub mod prompt;
pub mod run;
pub mod runner;
pub mod watch;

pub use error::{ArgvValidationError, RunError};
pub use exit::{status_for, ExitPlan};
pub use outcome::Outcome;
pub use run::{run, run_cli, Collaborators};
