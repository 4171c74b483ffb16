use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::DomainError;

/// Initialize the logging system with console output and file rotation.
///
/// Console output goes to stderr so it never interleaves with the
/// interactive prompt and waveform on stdout. Returns a guard that must
/// be kept alive for the duration of the application; dropping it
/// flushes any remaining logs.
pub fn init_logging(
    logs_dir: &Path,
    level: &str,
    file_logging: bool,
) -> Result<Option<WorkerGuard>, DomainError> {
    if file_logging {
        fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voicerelay={},warn", level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_filter(env_filter);

    if file_logging {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "voicerelay.log");

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new(format!("voicerelay={}", level)));

        // try_init so a second initialization (tests) is a no-op
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_ok()
        {
            tracing::info!(
                logs_dir = ?logs_dir,
                level = level,
                "Logging initialized with file output"
            );
        }

        Ok(Some(guard))
    } else {
        let _ = tracing_subscriber::registry().with(console_layer).try_init();

        tracing::info!(level = level, "Logging initialized (console only)");

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_with_file_logging_creates_the_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs_dir = dir.path().join("logs");

        let guard = init_logging(&logs_dir, "debug", true).unwrap();
        assert!(logs_dir.exists());
        assert!(guard.is_some());
    }

    #[test]
    fn init_console_only_returns_no_guard() {
        let guard = init_logging(Path::new("/nonexistent"), "info", false).unwrap();
        assert!(guard.is_none());
    }
}
