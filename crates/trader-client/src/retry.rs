//! # Idempotent Retry Submission
//!
//! Money-moving calls that the remote guarantees to be idempotent are
//! repeated until they produce a result or a wall-clock deadline passes.
//!
//! ## Loop Contract
//!
//! - success: stop immediately and return the result.
//! - `InsufficientFunds`: stop immediately. Resubmitting cannot help.
//! - `SecurityViolation`: stop immediately. A pin mismatch is never retried.
//! - anything else: wait `retry_interval`, then try again.
//!
//! The deadline is measured from the start of the submission, not from each
//! attempt, and is checked after every wait. Cancelling the caller's token
//! interrupts the wait.

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use trader_core::{ClassifiedError, ErrorKind, TransferRequest, TransferResult};

use crate::request::{paths, RequestClient};

/// Outcomes of a retried submission that did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The remote rejected the submission with a fatal error.
    #[error("submission rejected: {0}")]
    Rejected(#[source] ClassifiedError),

    /// The deadline passed without a result.
    #[error("submission timed out after {attempts} attempts in {elapsed:?}: {last_error}")]
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        last_error: ClassifiedError,
    },

    /// The caller abandoned the submission.
    #[error("submission cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// The remote accepted the transfer but returned no settlement reference.
    #[error("transfer accepted without a transaction hash")]
    MissingSettlementReference(TransferResult),
}

/// Retry timing for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_interval: Duration,
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn new(retry_interval: Duration, deadline: Duration) -> Self {
        Self {
            retry_interval,
            deadline,
        }
    }

    /// Whether `err` must end the loop instead of being retried.
    pub fn is_fatal(err: &ClassifiedError) -> bool {
        err.is_insufficient_funds() || matches!(err.kind(), ErrorKind::SecurityViolation)
    }

    /// Run `attempt` until it succeeds, fails fatally, the deadline passes
    /// or `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, SubmitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled { attempts });
            }

            attempts += 1;
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if Self::is_fatal(&err) => {
                    tracing::warn!(attempts, error = %err, "submission failed fatally; not retrying");
                    return Err(SubmitError::Rejected(err));
                }
                Err(err) => err,
            };

            tracing::warn!(
                attempt = attempts,
                retry_in = ?self.retry_interval,
                error = %err,
                "submission attempt failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(SubmitError::Cancelled { attempts });
                }
                _ = tokio::time::sleep(self.retry_interval) => {}
            }

            let elapsed = started.elapsed();
            if elapsed > self.deadline {
                tracing::error!(attempts, ?elapsed, "submission deadline exceeded");
                return Err(SubmitError::TimedOut {
                    attempts,
                    elapsed,
                    last_error: err,
                });
            }
        }
    }
}

/// Submits transfers through the idempotent `POST /send` call.
#[derive(Debug, Clone)]
pub struct IdempotentRetrySender {
    client: RequestClient,
    retry_interval: Duration,
}

impl IdempotentRetrySender {
    pub fn new(client: RequestClient, retry_interval: Duration) -> Self {
        Self {
            client,
            retry_interval,
        }
    }

    /// Submit `transfer` until it settles, returning its transaction hash.
    ///
    /// Relies on the remote treating repeated submissions of the same
    /// `tx_id` as one transfer.
    pub async fn submit(
        &self,
        transfer: &TransferRequest,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, SubmitError> {
        let policy = RetryPolicy::new(self.retry_interval, deadline);
        tracing::info!(tx_id = %transfer.tx_id, satoshis = transfer.satoshis, "submitting transfer");

        let result: TransferResult = policy
            .run(cancel, || {
                self.client
                    .call_with(Method::POST, paths::SEND, transfer)
            })
            .await?;

        match result.tx_hash.clone().filter(|hash| !hash.is_empty()) {
            Some(hash) => {
                tracing::info!(tx_id = %transfer.tx_id, tx_hash = %hash, "transfer settled");
                Ok(hash)
            }
            None => Err(SubmitError::MissingSettlementReference(result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(interval_ms: u64, deadline_ms: u64) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(deadline_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = policy(1000, 5000)
            .run(&CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ClassifiedError>(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn security_violation_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = policy(1000, 5000)
            .run(&CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClassifiedError::security_violation("pin mismatch"))
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn other_business_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = policy(1000, 5000)
            .run(&CancellationToken::new(), || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ClassifiedError::business("WalletLocked", "try later"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = policy(1000, 5000)
            .run(&cancel, || async { Ok::<_, ClassifiedError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Cancelled { attempts: 0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = policy(10_000, 60_000)
            .run(&cancel, || async {
                Err::<(), _>(ClassifiedError::network_down("refused"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Cancelled { attempts: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
