//! Jig CLI Binary

use jig::cli::{build_argv, report_fatal, LogArgs, OutputSink};
use jig::logging::{init_logging, LoggingConfig};
use jig::{run_cli, Collaborators, Outcome};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let options = match build_argv(std::env::args_os()) {
        Ok(Outcome::Continue(options)) => options,
        Ok(Outcome::Exit(code)) => return exit_code(code),
        Err(e) => {
            report_fatal(&anyhow::Error::new(e));
            return ExitCode::from(1);
        }
    };

    let logging_config = build_logging_config(&options.log);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    info!("Jig starting");
    let collaborators = Collaborators::default();
    let output = OutputSink::for_flags(options.json, options.use_stderr);
    let result = runtime.block_on(run_cli(options, None, &collaborators));
    match result {
        Ok(plan) => {
            let code = plan.finish(&output);
            // Dropping the runtime cancels pending async tasks and waits for blocking ones.
            drop(runtime);
            exit_code(code)
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Logging settings from the command line. Logging stays off unless asked for.
fn build_logging_config(args: &LogArgs) -> LoggingConfig {
    let mut config = LoggingConfig::default();
    if args.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = args.level {
        config.level = level.clone();
    }
    if let Some(ref format) = args.format {
        config.format = format.clone();
    }
    if let Some(ref file) = args.file {
        config.file = Some(file.clone());
        config.output = "file".to_string();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    config
}
