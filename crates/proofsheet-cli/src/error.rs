use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the worker before or around job execution.
///
/// Per-job render failures are not errors here; they are reported through
/// completion events and the exit status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Telemetry(String),

    #[error("failed to read job file {path}: {source}")]
    ReadJob {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse job file {path}: {source}")]
    ParseJob {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("asset directory {0} does not exist")]
    MissingAssets(PathBuf),
}
