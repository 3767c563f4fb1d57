//! Retry helper for writes that can hit SQLITE_BUSY.
//!
//! The scheduler and request handlers write to the same file; under WAL a
//! writer can still see `database is locked` when another write holds the lock
//! past the busy timeout.

use rand::random;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::{Error, Result};

const MAX_RETRIES: u32 = 8;
const BASE_DELAY_MS: u64 = 10;
const MAX_DELAY_MS: u64 = 1000;

fn is_busy(err: &Error) -> bool {
    let Error::DatabaseSqlx(sqlx_err) = err else {
        return false;
    };

    // Extended codes keep the primary code in the low byte.
    if let sqlx::Error::Database(db_err) = sqlx_err
        && let Some(code) = db_err.code().and_then(|c| c.parse::<i32>().ok())
        && matches!(code & 0xff, 5 | 6)
    {
        return true;
    }

    let msg = sqlx_err.to_string().to_ascii_lowercase();
    msg.contains("database is locked") || msg.contains("database is busy")
}

/// Delay before retry `attempt` (0-based): exponential, capped, with up to 25% jitter.
fn backoff(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(MAX_DELAY_MS);
    let jitter = random::<u64>() % (capped / 4 + 1);
    Duration::from_millis((capped + jitter).min(MAX_DELAY_MS))
}

/// Run `op`, retrying while it fails with SQLITE_BUSY/LOCKED.
pub async fn retry_on_sqlite_busy<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(err) if is_busy(&err) && attempt < MAX_RETRIES => {
                let delay = backoff(attempt);
                debug!(
                    op = op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "SQLite busy, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
