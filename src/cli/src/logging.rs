use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr by default; with a file path they append there
/// instead, the usual mode under a service manager. `RUST_LOG` narrows
/// or widens the filter.
pub fn setup_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or(Path::new("."));
            let file_name = path.file_name().context("log file needs a file name")?;
            let appender = RollingFileAppender::new(Rotation::NEVER, directory, file_name);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(appender))
                .try_init()
                .context("set tracing subscriber")?;
        }
        None => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("set tracing subscriber")?;
        }
    }
    Ok(())
}
