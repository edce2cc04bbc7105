//! Tracing configuration and log routing.
//!
//! Logs always go to stdout through a compact formatter. A second, non-blocking file layer is
//! added unless `DOCQA_LOG_FILE=off`:
//!
//! - `DOCQA_LOG_FILE=<path>` appends to that file.
//! - Otherwise a daily rolling `docqa.log` is written under `DOCQA_LOG_DIR` (default `logs/`).
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "docqa.log";

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// No file logging.
    Disabled,
    /// Append to a fixed file.
    File(PathBuf),
    /// Daily rolling files inside a directory.
    RollingDir(PathBuf),
}

impl LogTarget {
    /// Resolve the target from the `DOCQA_LOG_FILE` and `DOCQA_LOG_DIR` values.
    pub fn resolve(log_file: Option<String>, log_dir: Option<String>) -> Self {
        match log_file.as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(value) if !value.is_empty() => Self::File(PathBuf::from(value)),
            _ => {
                let dir = log_dir
                    .filter(|dir| !dir.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
                Self::RollingDir(PathBuf::from(dir))
            }
        }
    }

    fn from_env() -> Self {
        Self::resolve(
            std::env::var("DOCQA_LOG_FILE").ok(),
            std::env::var("DOCQA_LOG_DIR").ok(),
        )
    }
}

/// Configure tracing subscribers for stdout and optional file logging.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`. The non-blocking writer guard is
/// kept for the lifetime of the process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer(&LogTarget::from_env()) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking writer for the target.
///
/// Returns `None` when file logging is disabled or the destination cannot be opened.
fn configure_file_writer(target: &LogTarget) -> Option<NonBlocking> {
    match target {
        LogTarget::Disabled => None,
        LogTarget::File(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => Some(install_writer(file)),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    None
                }
            }
        }
        LogTarget::RollingDir(dir) => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            Some(install_writer(tracing_appender::rolling::daily(
                dir,
                LOG_FILE_PREFIX,
            )))
        }
    }
}

fn install_writer<W>(writer: W) -> NonBlocking
where
    W: std::io::Write + Send + 'static,
{
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let _ = LOG_GUARD.set(guard);
    non_blocking
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_rolling_logs_dir() {
        assert_eq!(
            LogTarget::resolve(None, None),
            LogTarget::RollingDir(PathBuf::from("logs"))
        );
        assert_eq!(
            LogTarget::resolve(Some(" ".into()), Some("/var/log/docqa".into())),
            LogTarget::RollingDir(PathBuf::from("/var/log/docqa"))
        );
    }

    #[test]
    fn explicit_file_wins_over_directory() {
        assert_eq!(
            LogTarget::resolve(Some("/tmp/docqa.log".into()), Some("ignored".into())),
            LogTarget::File(PathBuf::from("/tmp/docqa.log"))
        );
    }

    #[test]
    fn off_disables_file_logging() {
        assert_eq!(LogTarget::resolve(Some("OFF".into()), None), LogTarget::Disabled);
        assert!(configure_file_writer(&LogTarget::Disabled).is_none());
    }
}
