//! Logging to stdout and to `<results dir>/<participant>.log`.
//!
//! The filter defaults to `info` and can be overridden with `RUST_LOG`.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize dual-output logging.
///
/// The returned guard must be held until exit so buffered lines reach the
/// file. Falls back to stdout only when the log file cannot be created.
pub fn init(log_dir: &Path, participant: &str) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory {log_dir:?}: {e}, using stdout only");
        init_stdout_only();
        return None;
    }

    let file_appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(participant)
        .filename_suffix("log")
        .build(log_dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to create log file in {log_dir:?}: {e}");
            init_stdout_only();
            return None;
        }
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(filter())
        .init();

    tracing::info!(log_dir = ?log_dir, participant, "logging initialized");
    Some(guard)
}

fn init_stdout_only() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_target(true))
        .with(filter())
        .init();
    tracing::info!("logging initialized (stdout only)");
}
