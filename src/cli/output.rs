//! CLI output: the shared output sink, status lines, and fatal error reporting.

use crate::config::ResolvedConfigs;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use serde_json::json;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

/// Where the run writes its human-facing output.
///
/// `--json` and `--useStderr` move it to stderr so stdout carries only structured results.
#[derive(Clone)]
pub struct OutputSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    is_stderr: bool,
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("is_stderr", &self.is_stderr)
            .finish()
    }
}

impl OutputSink {
    pub fn stdout() -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(io::stdout()))),
            is_stderr: false,
        }
    }

    pub fn stderr() -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(io::stderr()))),
            is_stderr: true,
        }
    }

    /// Pick the process stream for the given flags.
    pub fn for_flags(json: bool, use_stderr: bool) -> Self {
        if json || use_stderr {
            Self::stderr()
        } else {
            Self::stdout()
        }
    }

    /// In-memory sink; the returned handle reads back everything written.
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        let sink = Self {
            writer: Arc::new(Mutex::new(Box::new(buffer.clone()))),
            is_stderr: false,
        };
        (sink, buffer)
    }

    pub fn is_stderr(&self) -> bool {
        self.is_stderr
    }

    pub fn write_line(&self, line: impl AsRef<str>) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line.as_ref())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

/// Shared byte buffer behind [`OutputSink::capture`].
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub const PRE_RUN_MESSAGE: &str = "Determining test suites to run...";

/// Banner shown before a one-shot run starts.
pub fn print_pre_run_message(output: &OutputSink) -> io::Result<()> {
    output.write_line(format!("{}", PRE_RUN_MESSAGE.bold().dimmed()))
}

/// Erase a partially written status line, only when the stream is a terminal.
pub fn clear_line<W: Write + IsTerminal>(stream: &mut W) {
    if stream.is_terminal() {
        let _ = write!(stream, "\r\x1b[K");
        let _ = stream.flush();
    }
}

/// Report an error that aborts the run: clear status lines, then print the full cause chain.
pub fn report_fatal(error: &anyhow::Error) {
    clear_line(&mut io::stdout());
    clear_line(&mut io::stderr());
    eprintln!("{}", format!("{:?}", error).red());
}

/// Deprecation notice printed once per deprecated config key.
pub fn print_deprecation(message: &str) {
    eprintln!("{}", "● Deprecation Warning:".yellow().bold());
    eprintln!();
    eprintln!("  {}", message.yellow());
    eprintln!();
}

/// Full JSON dump of a resolved run, used by `--showConfig` and `--debug`.
pub fn format_config_dump(resolved: &ResolvedConfigs) -> String {
    let configs: Vec<_> = resolved
        .project_configs
        .iter()
        .zip(resolved.config_paths.iter())
        .map(|(config, path)| {
            json!({
                "configPath": path,
                "config": config,
            })
        })
        .collect();
    let dump = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "configs": configs,
        "globalConfig": resolved.global_config,
        "hasDeprecationWarnings": resolved.has_deprecation_warnings,
    });
    serde_json::to_string_pretty(&dump).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Project overview table for `--debug`.
pub fn format_project_table(resolved: &ResolvedConfigs) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Project", "Root", "Config"]);
    for (config, path) in resolved
        .project_configs
        .iter()
        .zip(resolved.config_paths.iter())
    {
        let config_path = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            config.name.clone(),
            config.root_dir.display().to_string(),
            config_path,
        ]);
    }
    table.to_string()
}
