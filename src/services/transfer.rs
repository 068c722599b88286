use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::storage::{RemoteStore, StoreError};

/// Delay between two write attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    /// `base * 2^(failed - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Parses `none`, `fixed` or `exponential`
    pub fn parse(kind: &str, base: Duration) -> Option<Self> {
        match kind.trim().to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "fixed" => Some(Self::Fixed(base)),
            "exponential" | "exp" => Some(Self::Exponential {
                base,
                max: base * 16,
            }),
            _ => None,
        }
    }

    /// Delay after the `failed`-th failed attempt (1-based)
    pub fn delay(&self, failed: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => d,
            Self::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(failed.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_millis(500)),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    /// The target path is taken; never retried
    #[error("Remote file already exists: {0}")]
    Conflict(String),

    #[error("Upload failed after {attempts} attempt(s): {message}")]
    Exhausted { attempts: u32, message: String },
}

/// Writes buffered files to the remote store without overwriting, retrying
/// transient failures according to its [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferExecutor {
    policy: RetryPolicy,
}

impl TransferExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the number of attempts used.
    pub async fn transfer(
        &self,
        store: &dyn RemoteStore,
        remote_path: &str,
        data: Bytes,
    ) -> Result<u32, TransferError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.policy.attempt_timeout,
                store.write_file(remote_path, data.clone(), false),
            )
            .await
            {
                Ok(res) => res,
                Err(_) => Err(StoreError::Timeout(self.policy.attempt_timeout)),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(StoreError::AlreadyExists(path)) => return Err(TransferError::Conflict(path)),
                Err(e) => {
                    warn!(
                        "Upload of {} failed (attempt {}/{}): {}",
                        remote_path, attempt, max_attempts, e
                    );
                    if attempt >= max_attempts {
                        return Err(TransferError::Exhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let delay = self.policy.backoff.delay(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;

    #[test]
    fn test_backoff_delays() {
        let base = Duration::from_millis(100);
        assert_eq!(Backoff::None.delay(3), Duration::ZERO);
        assert_eq!(Backoff::Fixed(base).delay(1), base);
        assert_eq!(Backoff::Fixed(base).delay(5), base);

        let exp = Backoff::parse("exponential", base).unwrap();
        assert_eq!(exp.delay(1), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(200));
        assert_eq!(exp.delay(3), Duration::from_millis(400));
        assert_eq!(exp.delay(30), Duration::from_millis(1600));
    }

    #[test]
    fn test_backoff_parse() {
        let base = Duration::from_millis(250);
        assert_eq!(Backoff::parse("none", base), Some(Backoff::None));
        assert_eq!(Backoff::parse("Fixed", base), Some(Backoff::Fixed(base)));
        assert_eq!(Backoff::parse("linear", base), None);
    }

    #[tokio::test]
    async fn test_fresh_path_succeeds_first_attempt() {
        let store = MemoryStore::new();
        let executor = TransferExecutor::default();
        let attempts = executor
            .transfer(&store, "/a.pdf", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(store.read_file("/a.pdf").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_existing_path_is_a_conflict() {
        let store = MemoryStore::new();
        let executor = TransferExecutor::default();
        executor
            .transfer(&store, "/a.pdf", Bytes::from_static(b"first"))
            .await
            .unwrap();

        let err = executor
            .transfer(&store, "/a.pdf", Bytes::from_static(b"second"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Conflict(ref p) if p == "/a.pdf"));
        assert_eq!(store.read_file("/a.pdf").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_non_transient_failure_exhausts_budget() {
        let store = MemoryStore::new();
        let executor = TransferExecutor::new(RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::None,
            attempt_timeout: Duration::from_secs(1),
        });

        // Parent folder is missing, every attempt fails
        let err = executor
            .transfer(&store, "/missing/a.pdf", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Exhausted { attempts: 2, .. }));
    }
}
