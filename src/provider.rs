use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::types::{Instance, InstanceSelector, Page, Snapshot, Volume};

/// An error returned by a provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request throttled: {0}")]
    Throttled(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("unexpected response from provider: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Transient errors are worth retrying; everything else is a permanent
    /// answer from the provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Throttled(_) | ProviderError::Unavailable(_))
    }
}

/// This trait describes the calls we make against a cloud provider.
///
/// Every component receives its provider explicitly, which lets the commands
/// run against the HTTP client in production and an in-memory fleet in
/// tests.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Returns one page of instances matching the selector. Pass the
    /// `next_page` token of the previous page to continue.
    async fn list_instances(
        &self,
        selector: &InstanceSelector,
        page_token: Option<String>,
    ) -> Result<Page<Instance>, ProviderError>;

    /// Returns the current view of a single instance.
    async fn describe_instance(&self, instance_id: &str) -> Result<Instance, ProviderError>;

    /// Returns the volumes attached to an instance, in provider order.
    async fn list_volumes(&self, instance_id: &str) -> Result<Vec<Volume>, ProviderError>;

    /// Returns the snapshots of a volume, in provider order.
    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>, ProviderError>;

    async fn stop_instance(&self, instance_id: &str) -> Result<(), ProviderError>;

    async fn start_instance(&self, instance_id: &str) -> Result<(), ProviderError>;

    /// Requests a new snapshot. The provider treats a repeated `client_token`
    /// as the same request.
    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        client_token: &str,
    ) -> Result<Snapshot, ProviderError>;
}

/// How transient provider errors are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// The delay before retry number `attempt` (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails permanently, or runs out of retries.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                log::debug!("transient provider error, retrying in {:?}: {}", delay, err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(10), Duration::from_secs(8));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast_policy(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::Throttled("slow down".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&fast_policy(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("503".to_string()))
        })
        .await;

        assert_eq!(result, Err(ProviderError::Unavailable("503".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&fast_policy(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Rejected("IncorrectInstanceState".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
