use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::cli::LoggingArgs;
use crate::error::CliError;

/// Install the global tracing subscriber.
///
/// `--log-level` sets the default directive; `RUST_LOG` refines it.
pub fn init(logging: &LoggingArgs) -> Result<(), CliError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = if logging.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| CliError::Telemetry(format!("failed to install tracing subscriber: {err}")))
}
