use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wiretest", version, about = "Runs declarative wire-level integration tests")]
pub struct Cli {
    /// Emit JSON output instead of human-readable output.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Execute test definitions and report per-case results.
    Run {
        /// Test definition files, JSON or YAML by extension.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Seed a test variable every case sees (repeatable). The value is
        /// taken literally, or from a file with KEY=@path.
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Receive timeout for endpoints that do not configure their own.
        #[arg(long, value_name = "MILLIS")]
        timeout_ms: Option<u64>,

        /// Write a JSON-lines event trace to this file.
        #[arg(long, value_name = "PATH")]
        trace: Option<String>,
    },
    /// Parse test definitions and print their normalized form without
    /// executing anything.
    Check {
        /// Test definition files, JSON or YAML by extension.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}
