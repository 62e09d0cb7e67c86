use std::path::PathBuf;

use clap::{builder::BoolishValueParser, Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Command-line arguments for the Proofsheet export worker.
#[derive(Debug, Parser)]
#[command(name = "proofsheet", version, about = "Render Proofsheet export jobs")]
pub struct CliArgs {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render export job files against a local asset directory.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Directory that source and watermark keys resolve against.
    #[arg(long, env = "PROOFSHEET_ASSETS", value_name = "DIR")]
    pub assets: PathBuf,

    /// Directory finished exports are written under.
    #[arg(long, env = "PROOFSHEET_EXPORTS", value_name = "DIR")]
    pub exports: PathBuf,

    /// Number of jobs rendered in parallel; defaults to the CPU count.
    #[arg(long, env = "PROOFSHEET_JOBS", value_name = "COUNT")]
    pub jobs: Option<usize>,

    /// Job files, each holding one export job or an array of them.
    #[arg(required = true, value_name = "JOB.json")]
    pub job_files: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct LoggingArgs {
    /// Base log level (trace|debug|info|warn|error); RUST_LOG directives win.
    #[arg(
        long = "log-level",
        env = "PROOFSHEET_LOG_LEVEL",
        value_name = "LEVEL",
        default_value = "info",
        global = true
    )]
    pub level: LevelFilter,

    /// Emit logs as JSON lines.
    #[arg(
        long = "log-json",
        env = "PROOFSHEET_LOG_JSON",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        global = true
    )]
    pub json: bool,
}
