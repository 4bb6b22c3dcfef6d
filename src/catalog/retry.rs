//! Connection retry policy.
//!
//! Transient failures (refused/reset connections, timeouts, class 08 codes,
//! too-many-connections, cannot-connect-now) are retried with exponential
//! backoff 1s/2s/4s plus up to 500 ms of jitter, at most three attempts.
//! Auth failures and connection-string parse errors fail fast.

use sqlx::postgres::PgPool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_JITTER_MS: u64 = 500;

/// invalid_password
const AUTH_ERROR_CODE: &str = "28P01";
/// invalid_authorization_specification
const INVALID_AUTH_SPEC_CODE: &str = "28000";
const TOO_MANY_CONNECTIONS: &str = "53300";
const CANNOT_CONNECT_NOW: &str = "57P03";

/// Errors from the catalog layer.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("connection failed: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("catalog query failed: {0}")]
    Query(#[source] sqlx::Error),
}

/// Connect to PostgreSQL, retrying transient failures with backoff.
pub(crate) async fn connect_with_retry(url: &str) -> Result<PgPool, CatalogError> {
    let mut last_err = None;

    for attempt in 0..MAX_RETRIES {
        match PgPool::connect(url).await {
            Ok(pool) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "connected after retry");
                }
                return Ok(pool);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(CatalogError::Connection(e));
                }
                let delay = backoff_delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    error = %e,
                    retry_in = ?delay,
                    "connection failed, retrying"
                );
                last_err = Some(e);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(CatalogError::Connection(last_err.expect("retries exhausted")))
}

/// Classify an error as retryable or fail-fast.
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        // Connection string parse/config errors are deterministic.
        sqlx::Error::Configuration(_) => false,

        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(AUTH_ERROR_CODE) | Some(INVALID_AUTH_SPEC_CODE) => false,
            // Retry only known transient server-side connection failures.
            Some(code) => {
                code.starts_with("08") || code == TOO_MANY_CONNECTIONS || code == CANNOT_CONNECT_NOW
            }
            None => false,
        },

        sqlx::Error::Io(io) => {
            use std::io::ErrorKind;
            matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
                    | ErrorKind::WouldBlock
            ) || is_retryable_message(&io.to_string())
        }

        sqlx::Error::PoolTimedOut => true,

        other => {
            let msg = other.to_string().to_lowercase();
            if msg.contains("password authentication failed")
                || msg.contains("no pg_hba.conf entry")
                || msg.contains("no such host")
                || msg.contains("invalid connection")
            {
                return false;
            }
            // Unknown errors may be transient.
            true
        }
    }
}

fn is_retryable_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("connection refused")
        || msg.contains("connection reset")
        || msg.contains("i/o timeout")
        || msg.contains("timed out")
        || msg.contains("temporary failure in name resolution")
}

/// Exponential backoff with jitter: 1s, 2s, 4s plus up to 500 ms.
fn backoff_delay(attempt: u32) -> Duration {
    let delay = BASE_DELAY * (1 << attempt);
    delay + Duration::from_millis(jitter_ms())
}

// The pack carries no rand crate; a sub-second smear from the clock nanos is
// enough to keep concurrent CI runs from reconnecting in lockstep.
fn jitter_ms() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % MAX_JITTER_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential_with_bounded_jitter() {
        for attempt in 0..3u32 {
            let base = Duration::from_secs(1 << attempt);
            let delay = backoff_delay(attempt);
            assert!(delay >= base, "attempt {attempt}: {delay:?}");
            assert!(delay < base + Duration::from_millis(MAX_JITTER_MS));
        }
    }

    #[test]
    fn jitter_within_bounds() {
        for _ in 0..100 {
            assert!(jitter_ms() < MAX_JITTER_MS);
        }
    }

    #[test]
    fn io_errors_are_retryable() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(is_retryable(&err));
    }

    #[test]
    fn config_errors_fail_fast() {
        let err = sqlx::Error::Configuration("bad url".into());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn pool_timeout_is_retryable() {
        assert!(is_retryable(&sqlx::Error::PoolTimedOut));
    }
}
