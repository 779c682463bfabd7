use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::Layer, prelude::*, registry, EnvFilter};

/// Keeps the background log writers alive; logs may be lost if this is dropped early
pub struct Guard {
    _inner: Vec<WorkerGuard>,
}

/// Install the global subscriber (which also picks up records from the `log` crate).
///
/// `default_level` is used unless `RUST_LOG` says otherwise. With a `log_dir`, a compact
/// copy of the log is also written to an hourly rolling file there.
pub fn init_logging(default_level: &str, log_dir: Option<PathBuf>) -> Result<Guard> {
    let global_filter = EnvFilter::builder()
        .with_default_directive(default_level.parse()?)
        .from_env()?;
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = Layer::new().with_writer(stdout).pretty();
    let mut guards = vec![stdout_guard];

    let logfile_layer = match log_dir {
        Some(log_dir) => {
            let appender = tracing_appender::rolling::hourly(log_dir, "observation-loader.log");
            let (logfile, logfile_guard) = tracing_appender::non_blocking(appender);
            guards.push(logfile_guard);
            Some(Layer::new().with_writer(logfile).compact().with_ansi(false))
        }
        None => None,
    };

    registry()
        .with(global_filter)
        .with(stdout_layer)
        .with(logfile_layer)
        .try_init()?;
    Ok(Guard { _inner: guards })
}
