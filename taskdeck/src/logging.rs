//! Tracing setup for embedding applications.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is the host's choice. This helper wires up the common case: an
//! `EnvFilter` (environment overrides the passed level) writing either to
//! stderr or to a non-blocking file appender.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize logging.
///
/// With a file path, logs are written through a non-blocking appender and
/// the returned [`WorkerGuard`] must be held until shutdown to ensure all
/// buffered entries are flushed. Without one, logs go to stderr and no
/// guard is needed.
///
/// Safe to call more than once; later calls leave the existing subscriber
/// in place.
pub fn init(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if let Some(log_path) = file_path {
        let log_dir = log_path.parent()?;
        let file_name = log_path.file_name()?.to_str()?;

        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let _ = tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(env_filter)
            .with_ansi(false)
            .try_init();
        Some(guard)
    } else {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .try_init();
        None
    }
}
