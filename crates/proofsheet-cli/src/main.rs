use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use proofsheet_core::job::{ExportJob, ExportRunner, JobReport};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{error, info, Dispatch, Level};

mod cli;
mod error;
mod store;
mod telemetry;

use cli::{CliArgs, Command, RenderArgs};
use error::CliError;
use store::{DirectoryStore, LogNotifier};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(err) = telemetry::init(&args.logging) {
        report_error(&err);
        return ExitCode::FAILURE;
    }

    let result = match args.command {
        Command::Render(render) => run_render(&render),
    };

    match result {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &CliError) {
    if tracing::dispatcher::has_been_set() {
        error!(error = %err, "worker error");
        return;
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::with_default(&dispatch, || {
        error!(error = %err, "worker error");
    });
}

/// A job file holds a single job or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum JobFile {
    One(Box<ExportJob>),
    Many(Vec<ExportJob>),
}

fn load_jobs(path: &Path) -> Result<Vec<ExportJob>, CliError> {
    let bytes = fs::read(path).map_err(|source| CliError::ReadJob {
        path: path.to_path_buf(),
        source,
    })?;
    let file: JobFile = serde_json::from_slice(&bytes).map_err(|source| CliError::ParseJob {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match file {
        JobFile::One(job) => vec![*job],
        JobFile::Many(jobs) => jobs,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Summary {
    succeeded: usize,
    failed: usize,
}

fn run_render(args: &RenderArgs) -> Result<Summary, CliError> {
    if !args.assets.is_dir() {
        return Err(CliError::MissingAssets(args.assets.clone()));
    }

    let mut jobs = Vec::new();
    for path in &args.job_files {
        jobs.extend(load_jobs(path)?);
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = args.jobs {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    info!(
        jobs = jobs.len(),
        threads = pool.current_num_threads(),
        assets = %args.assets.display(),
        exports = %args.exports.display(),
        "rendering exports"
    );

    let store = DirectoryStore::new(&args.assets, &args.exports);
    let notifier = LogNotifier;
    let runner = ExportRunner::new(&store, &notifier);

    let reports: Vec<JobReport> = pool.install(|| jobs.par_iter().map(|job| runner.run(job)).collect());

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    let summary = Summary {
        succeeded: reports.len() - failed,
        failed,
    };
    info!(succeeded = summary.succeeded, failed = summary.failed, "finished");
    Ok(summary)
}
