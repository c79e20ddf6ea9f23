use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::Result;

/// Fixed-delay retry around a fallible async operation.
///
/// `retries` counts the extra attempts after the first one, so a policy with
/// `retries = 4` performs at most five calls. Only errors reporting
/// [`is_retryable`](crate::error::OcorrenciasError::is_retryable) are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0_u32;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && failures < self.retries => {
                    failures += 1;
                    warn!(
                        "{operation} failed (retry {failures}/{}): {e}; retrying in {:?}",
                        self.retries, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
