//! Logging setup with a reloadable filter and daily log files.
//!
//! This module provides:
//! - Runtime log level changes via `tracing_subscriber::reload`
//! - Console output plus a daily-rolling file through `tracing_appender`
//! - Log file retention cleanup (deletes logs older than 7 days)
//! - Local timezone timestamps for logs

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "rssagg_notify=info,sqlx=warn";

/// Rolling log file prefix; files are named `rssagg-notify.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "rssagg-notify.log";

/// Log retention period in days.
const LOG_RETENTION_DAYS: i64 = 7;

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Handle to the installed subscriber.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: PathBuf,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter, e.g. `"rssagg_notify=debug,sqlx=warn"`.
    pub fn set_filter(&self, directive: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| Error::validation(format!("Invalid filter directive: {e}")))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| Error::Other(format!("Failed to reload filter: {e}")))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Start the daily log retention cleanup task.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        let log_dir = self.log_dir.clone();

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {
                        let today = Local::now().date_naive();
                        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS, today).await {
                            warn!(error = %e, "Failed to cleanup old logs");
                        }
                    }
                }
            }
        })
    }
}

/// Delete rolled log files dated more than `retention_days` before `today`.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64, today: NaiveDate) -> std::io::Result<usize> {
    let cutoff = today - chrono::Duration::days(retention_days);
    let prefix = format!("{LOG_FILE_PREFIX}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix.as_str()))
        else {
            continue;
        };

        let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

/// Initialize logging with a reloadable filter.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Keep the returned guard alive for
/// the lifetime of the process or buffered file output is lost.
pub fn init_logging(log_dir: &str) -> Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_path = PathBuf::from(log_dir);
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let initial_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    let config = Arc::new(LoggingConfig {
        handle: filter_handle,
        log_dir: log_path,
    });

    Ok((config, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_LOG_FILTER.contains("rssagg_notify=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_filter_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (_layer, handle): (_, FilterHandle) =
            reload::Layer::new(EnvFilter::new(DEFAULT_LOG_FILTER));
        let config = LoggingConfig {
            handle,
            log_dir: dir.path().to_path_buf(),
        };

        assert!(config.get_filter().contains("rssagg_notify=info"));
        assert_eq!(config.log_dir(), dir.path());

        config.set_filter("rssagg_notify=debug,sqlx=warn").unwrap();
        assert!(config.get_filter().contains("rssagg_notify=debug"));

        assert!(matches!(
            config.set_filter("rssagg_notify=notalevel"),
            Err(Error::Validation(_))
        ));
        assert!(config.get_filter().contains("rssagg_notify=debug"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_logs() {
        let dir = tempfile::tempdir().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();

        for name in [
            "rssagg-notify.log.2025-03-01",
            "rssagg-notify.log.2025-03-12",
            "rssagg-notify.log.2025-03-19",
            "rssagg-notify.log.garbage",
            "other.log.2025-01-01",
        ] {
            std::fs::write(dir.path().join(name), b"line\n").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), LOG_RETENTION_DAYS, today)
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(!dir.path().join("rssagg-notify.log.2025-03-01").exists());
        assert!(!dir.path().join("rssagg-notify.log.2025-03-12").exists());
        assert!(dir.path().join("rssagg-notify.log.2025-03-19").exists());
        assert!(dir.path().join("rssagg-notify.log.garbage").exists());
        assert!(dir.path().join("other.log.2025-01-01").exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        assert!(cleanup_old_logs(&missing, LOG_RETENTION_DAYS, today).await.is_err());
    }
}
