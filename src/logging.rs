//! Logging setup shared by the bot and the notifier daemon.
//!
//! Both binaries log to systemd's journal when it is reachable. Otherwise the
//! bot writes a daily rolling file in the data directory and the daemon
//! writes to stderr, where cron or a service manager collects it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter variable for the bot, e.g. `SWEEPWATCH_LOG=sweepwatch::notify=debug,info`.
pub const LOG_ENV: &str = "SWEEPWATCH_LOG";
/// Filter variable for the daemon.
pub const DAEMON_LOG_ENV: &str = "RUST_LOG";
/// Used when the filter variable is unset or unparseable.
pub const DEFAULT_FILTER: &str = "info";
pub const LOG_FILE_NAME: &str = "sweepwatch.log";

/// Where logs go when journald is not available.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// Daily rolling file `file_name` under `dir`.
    File { dir: PathBuf, file_name: String },
    Stderr,
}

/// The backend `init` ended up using.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Journald,
    File(PathBuf),
    Stderr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSetup {
    pub filter_env: &'static str,
    pub fallback: Fallback,
}

impl LogSetup {
    /// The bot: `SWEEPWATCH_LOG`, falling back to a file in `log_dir`.
    pub fn bot(log_dir: Option<PathBuf>) -> Self {
        Self {
            filter_env: LOG_ENV,
            fallback: Fallback::File {
                dir: log_dir.unwrap_or_else(default_log_dir),
                file_name: LOG_FILE_NAME.to_string(),
            },
        }
    }

    /// The notifier daemon: `RUST_LOG`, falling back to stderr.
    pub fn daemon() -> Self {
        Self {
            filter_env: DAEMON_LOG_ENV,
            fallback: Fallback::Stderr,
        }
    }

    fn filter(&self) -> EnvFilter {
        filter_from(std::env::var(self.filter_env).ok().as_deref())
    }

    /// Install the global subscriber. Call once at startup.
    pub fn init(&self) -> Result<Backend> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(self.filter())
                    .with(journald_layer)
                    .try_init()
                    .context("Failed to set tracing subscriber")?;

                tracing::info!("Logging initialized with journald backend");
                return Ok(Backend::Journald);
            }
        }

        match &self.fallback {
            Fallback::File { dir, file_name } => {
                let (writer, guard) = file_writer(dir, file_name)?;

                // The writer thread stops when the guard drops
                static GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();
                let _ = GUARD.set(guard);

                tracing_subscriber::registry()
                    .with(self.filter())
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init()
                    .context("Failed to set tracing subscriber")?;

                tracing::info!("Logging initialized with file backend at {:?}", dir);
                Ok(Backend::File(dir.join(file_name)))
            }
            Fallback::Stderr => {
                tracing_subscriber::registry()
                    .with(self.filter())
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init()
                    .context("Failed to set tracing subscriber")?;
                Ok(Backend::Stderr)
            }
        }
    }
}

/// Parse a filter directive, falling back to [`DEFAULT_FILTER`].
fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn file_writer(dir: &Path, file_name: &str) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sweepwatch")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bot_and_daemon_setups() {
        let bot = LogSetup::bot(Some(PathBuf::from("/var/log/sweepwatch")));
        assert_eq!(bot.filter_env, "SWEEPWATCH_LOG");
        assert_eq!(
            bot.fallback,
            Fallback::File {
                dir: PathBuf::from("/var/log/sweepwatch"),
                file_name: "sweepwatch.log".to_string(),
            }
        );

        let daemon = LogSetup::daemon();
        assert_eq!(daemon.filter_env, "RUST_LOG");
        assert_eq!(daemon.fallback, Fallback::Stderr);
    }

    #[test]
    fn test_bot_defaults_to_data_dir() {
        match LogSetup::bot(None).fallback {
            Fallback::File { dir, .. } => assert!(dir.ends_with("sweepwatch/logs")),
            Fallback::Stderr => panic!("bot should log to a file"),
        }
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_from(None).to_string(), "info");
        assert_eq!(filter_from(Some("debug")).to_string(), "debug");
        assert_eq!(
            filter_from(Some("sweepwatch::notify=debug")).to_string(),
            "sweepwatch::notify=debug"
        );
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("a").join("logs");
        let (_writer, _guard) = file_writer(&logs, LOG_FILE_NAME).unwrap();
        assert!(logs.is_dir());
    }
}
