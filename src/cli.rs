// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgGroup, Parser, ValueEnum};

/// Command-line arguments for `hdlrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hdlrun",
    version,
    about = "Run FPGA/ASIC toolchain tasks for HDL projects and inspect their reports.",
    long_about = None
)]
#[command(group(
    ArgGroup::new("action")
        .args(["task", "clean", "report", "console", "list"])
        .multiple(false)
))]
pub struct CliArgs {
    /// Path to the project file (TOML).
    ///
    /// Default: `Hdlrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Hdlrun.toml")]
    pub config: String,

    /// Project to operate on. Defaults to `[config].selected`, then the
    /// first project by name.
    #[arg(long, value_name = "NAME")]
    pub project: Option<String>,

    /// Run this task and wait for it. Ctrl-C stops it.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,

    /// Remove everything the toolchain generated for the project.
    #[arg(long)]
    pub clean: bool,

    /// Open the report of KIND produced by TASK
    /// (report, timing-analyzer, report-db, ...).
    #[arg(long, num_args = 2, value_names = ["TASK", "KIND"])]
    pub report: Option<Vec<String>>,

    /// Print the console definition for a shell (bash, powershell, ...).
    #[arg(long, value_name = "SHELL")]
    pub console: Option<String>,

    /// List projects and their tasks.
    #[arg(long)]
    pub list: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HDLRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print projects and commands, but don't execute
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
