//! Command line around `wiretest-core`: loads declarative test definitions,
//! runs them and reports results.

mod cli;
mod config;
mod output;
mod trace;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use wiretest_core::TestContext;

pub use cli::{Cli, Command};

use output::FileReport;
use trace::TraceFileSink;

/// Executes a parsed command line. Exit codes: 0 when every case passes,
/// 1 when cases fail, 2 on usage or configuration errors.
pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            files,
            vars,
            timeout_ms,
            trace,
        } => run_files(&files, &vars, timeout_ms, trace.as_deref(), cli.json),
        Command::Check { files } => check_files(&files, cli.json),
    }
}

fn run_files(
    files: &[PathBuf],
    vars: &[String],
    timeout_ms: Option<u64>,
    trace: Option<&str>,
    json: bool,
) -> ExitCode {
    let variables = match config::parse_variables(vars) {
        Ok(variables) => variables,
        Err(message) => return output::error_exit(&message, json),
    };
    let sink = match trace {
        Some(path) => match TraceFileSink::new(path) {
            Ok(sink) => Some(sink),
            Err(message) => return output::error_exit(&message, json),
        },
        None => None,
    };
    // Surface definition errors before any endpoint binds or case runs.
    let mut definitions = Vec::new();
    for file in files {
        match config::load_definition(file) {
            Ok(definition) => definitions.push((file.display().to_string(), definition)),
            Err(message) => return output::error_exit(&message, json),
        }
    }

    let default_timeout = timeout_ms.map(Duration::from_millis);
    let mut reports = Vec::new();
    for (file, definition) in &definitions {
        log::info!(
            "running test definition '{file}' with {} case(s)",
            definition.cases.len()
        );
        let suite = match config::build_suite(definition, default_timeout, &variables) {
            Ok(suite) => suite,
            Err(message) => return output::error_exit(&message, json),
        };
        let report = match &sink {
            Some(sink) => suite.runner.run_observed(TestContext::new, |result, context| {
                sink.record_case(result, context)
            }),
            None => suite.runner.run(),
        };
        reports.push(FileReport {
            file: file.clone(),
            report,
        });
    }

    if json {
        println!("{}", output::format_run_json(&reports));
    } else {
        print!("{}", output::format_run_human(&reports));
    }
    output::run_exit_code(&reports)
}

fn check_files(files: &[PathBuf], json: bool) -> ExitCode {
    let mut checked = Vec::new();
    for file in files {
        match config::load_definition(file) {
            Ok(definition) => checked.push((file.display().to_string(), definition)),
            Err(message) => return output::error_exit(&message, json),
        }
    }
    if json {
        println!("{}", output::format_check_json(&checked));
    } else {
        print!("{}", output::format_check_human(&checked));
    }
    ExitCode::SUCCESS
}
