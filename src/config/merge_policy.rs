//! Merge rules: defaults, override order, conflict handling.
//!
//! Order, lowest to highest: builder defaults, config file (or inline JSON), command line.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_TEST_FAILURE_EXIT_CODE: i32 = 1;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("test_failure_exit_code", DEFAULT_TEST_FAILURE_EXIT_CODE as i64)?
        .set_default("cache", true)
}

pub fn default_test_match() -> Vec<String> {
    vec![
        "**/__tests__/**/*".to_string(),
        "**/*.test.*".to_string(),
        "**/*.spec.*".to_string(),
        "**/*_test.*".to_string(),
    ]
}

pub fn default_path_ignore_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

/// A boolean flag that is on when either the command line or the file turns it on.
pub fn flag(cli: bool, file: Option<bool>) -> bool {
    cli || file.unwrap_or(false)
}

/// Command line wins over the file when present.
pub fn prefer<T>(cli: Option<T>, file: Option<T>) -> Option<T> {
    cli.or(file)
}
