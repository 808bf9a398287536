//! # Retry Policies
//!
//! Exponential backoff for re-opening a dropped control channel.
//!
//! ## Usage
//!
//! ```rust
//! use smarttv_remote::retry::{RetryPolicy, with_retry};
//! use smarttv_remote::RemoteError;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! let attempts = AtomicUsize::new(0);
//! let rt = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//!
//! let policy = RetryPolicy::custom(2, Duration::from_millis(1), Duration::from_millis(4));
//! let result = rt.block_on(async {
//!     with_retry(&policy, || {
//!         let attempt = attempts.fetch_add(1, Ordering::SeqCst);
//!         async move {
//!             if attempt == 0 {
//!                 Err(RemoteError::Timeout { seconds: 5 })
//!             } else {
//!                 Ok::<_, RemoteError>("connected")
//!             }
//!         }
//!     })
//!     .await
//! });
//!
//! assert_eq!(result.unwrap(), "connected");
//! ```

use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::error::{RemoteError, RemoteResult};

/// Policy controlling how failed operations are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Fail immediately on error.
    None,

    /// Retry with exponential backoff.
    Backoff {
        /// Maximum number of retry attempts (not counting the initial attempt).
        max_retries: u32,

        /// Initial delay before the first retry.
        base_delay: Duration,

        /// Maximum delay between retries.
        max_delay: Duration,
    },
}

impl RetryPolicy {
    /// No retries.
    ///
    /// ```
    /// use smarttv_remote::retry::RetryPolicy;
    ///
    /// assert!(matches!(RetryPolicy::none(), RetryPolicy::None));
    /// ```
    #[must_use]
    pub fn none() -> Self {
        Self::None
    }

    /// Custom backoff policy.
    #[must_use]
    pub fn custom(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self::Backoff {
            max_retries,
            base_delay,
            max_delay,
        }
    }
}

impl From<&ReconnectConfig> for RetryPolicy {
    /// `max_attempts` counts every try, so it becomes `max_attempts - 1`
    /// retries. A disabled config or zero attempts yields [`RetryPolicy::None`].
    fn from(config: &ReconnectConfig) -> Self {
        if !config.enabled || config.max_attempts == 0 {
            return Self::None;
        }
        Self::custom(
            config.max_attempts - 1,
            Duration::from_secs(config.base_delay_secs),
            Duration::from_secs(config.max_delay_secs),
        )
    }
}

/// Execute an async operation with retry logic.
///
/// Only errors for which [`RemoteError::is_retryable()`] holds are retried.
/// On exhaustion, returns [`RemoteError::RetriesExhausted`] wrapping the last
/// error encountered.
///
/// # Errors
/// Returns the first non-retryable error, or `RetriesExhausted`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> RemoteResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = RemoteResult<T>>,
{
    let RetryPolicy::Backoff {
        max_retries,
        base_delay,
        max_delay,
    } = policy
    else {
        return operation().await;
    };

    let mut delay = *base_delay;
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt == *max_retries {
            return Err(RemoteError::RetriesExhausted {
                attempts: attempt + 1,
                last_error: Box::new(err),
            });
        }

        tracing::warn!(
            attempt = attempt + 1,
            max = max_retries + 1,
            error = %err,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Retrying after transient error"
        );

        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, *max_delay);
        attempt += 1;
    }
}
