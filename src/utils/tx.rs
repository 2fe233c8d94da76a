// src/utils/tx.rs

use std::time::Duration;

use crate::error::AppError;

/// Bounds for a multi-step store mutation: how long one attempt may run and
/// how many times a transient failure is retried before surfacing.
#[derive(Debug, Clone)]
pub struct TxOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Base delay for linear backoff: attempt N sleeps N * backoff.
    pub backoff: Duration,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            max_retries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Runs `op` under a timeout, retrying transient failures with linear
/// backoff up to `opts.max_retries`.
///
/// The operation is expected to open, run and commit its own transaction, so
/// each invocation starts from a clean slate: a timed-out or failed attempt
/// leaves nothing behind for the next one to trip over (the dropped
/// transaction rolls back). Non-retryable errors (validation, business
/// rules, not-found) surface immediately.
pub async fn with_retries<T, F, Fut>(opts: &TxOptions, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(opts.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Transient(format!(
                "operation timed out after {:?}",
                opts.timeout
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt <= opts.max_retries => {
                tracing::warn!(
                    "Transient store failure (attempt {}/{}): {}, retrying",
                    attempt,
                    opts.max_retries,
                    err
                );
                tokio::time::sleep(opts.backoff * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}
