//! Runner selection: run in-process, or hand the whole invocation to the jig version a
//! project pins.

use crate::error::RunError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Set on delegated children so they never delegate again.
pub const DELEGATED_ENV: &str = "JIG_DELEGATED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runner {
    Local,
    Delegating(PathBuf),
}

/// `runner_version` from `<root>/jig.toml`, if the file exists and sets one.
pub fn peek_runner_version(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("jig.toml")).ok()?;
    let value: toml::Value = toml::from_str(&text).ok()?;
    value
        .get("runner_version")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Pick the runner for a single project root using the process environment.
pub fn select_runner(root: &Path) -> Runner {
    select_runner_with(
        root,
        std::env::var_os(DELEGATED_ENV).is_some(),
        std::env::var_os("PATH").as_deref(),
    )
}

pub fn select_runner_with(root: &Path, delegated: bool, path_var: Option<&OsStr>) -> Runner {
    if delegated {
        return Runner::Local;
    }
    let Some(version) = peek_runner_version(root) else {
        return Runner::Local;
    };
    if version == env!("CARGO_PKG_VERSION") {
        return Runner::Local;
    }

    match find_runner_binary(root, &version, path_var) {
        Some(binary) => {
            info!(version = %version, binary = %binary.display(), "Delegating to pinned runner");
            Runner::Delegating(binary)
        }
        None => {
            debug!(version = %version, "Pinned runner not installed; running locally");
            Runner::Local
        }
    }
}

fn find_runner_binary(root: &Path, version: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let name = format!("jig-{}{}", version, std::env::consts::EXE_SUFFIX);
    std::iter::once(root.join(".jig").join("bin"))
        .chain(path_var.map(|p| std::env::split_paths(p).collect::<Vec<_>>()).unwrap_or_default())
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
}

/// Run `binary` with the original arguments and return its exit code.
pub async fn delegate(binary: &Path, raw_args: &[OsString]) -> Result<i32, RunError> {
    let status = tokio::process::Command::new(binary)
        .args(raw_args)
        .env(DELEGATED_ENV, "1")
        .status()
        .await
        .map_err(|e| RunError::Delegation(format!("failed to start {}: {}", binary.display(), e)))?;
    Ok(status.code().unwrap_or(1))
}
