//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use std::time::Duration;

/// Default number of records per remote page.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Default number of records per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records requested per remote page.
    pub page_size: u32,
    /// Records committed per local transaction.
    pub batch_size: usize,
    /// Retry configuration for remote page requests.
    pub retry: RetryConfig,
    /// Per-request timeout of the remote client.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default sizes.
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero page size, batch size or attempt count,
    /// and for a backoff multiplier below 1 or not finite.
    pub fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 {
            return Err(SyncError::config("page size must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(SyncError::config("batch size must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::config("retry attempts must be greater than zero"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(SyncError::config(format!(
                "backoff multiplier must be a finite number of at least 1, got {multiplier}"
            )));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// `max_attempts` counts every call, the first one included.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per page.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Retries immediately, without sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::no_retry()
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    ///
    /// The result always lies within `0..=max_delay` (plus jitter), whatever
    /// the multiplier.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // min() and max() both discard NaN
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64()).max(0.0);

        if self.add_jitter && delay_secs > 0.0 {
            // Up to 25% on top
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen_range(0.0..1.0);
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_page_size(50)
            .with_batch_size(25)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.page_size, 50);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sizes_rejected() {
        let err = SyncConfig::new().with_page_size(0).validate().unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(SyncConfig::new().with_batch_size(0).validate().is_err());
        assert!(SyncConfig::new()
            .with_retry(RetryConfig::immediate(0))
            .validate()
            .is_err());
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
        assert!(delay2 <= Duration::from_millis(250));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn odd_multipliers_never_produce_negative_delays() {
        for multiplier in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let config = RetryConfig::new(5)
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(1))
                .with_backoff_multiplier(multiplier);

            for attempt in 1..5 {
                assert!(config.delay_for_attempt(attempt) <= Duration::from_millis(1250));
            }
        }
    }

    #[test]
    fn bad_multiplier_rejected() {
        for multiplier in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            let config = SyncConfig::new()
                .with_retry(RetryConfig::new(3).with_backoff_multiplier(multiplier));
            assert_eq!(config.validate().unwrap_err().kind(), "config");
        }
        assert!(SyncConfig::new()
            .with_retry(RetryConfig::new(3).with_backoff_multiplier(1.0))
            .validate()
            .is_ok());
    }

    #[test]
    fn immediate_never_sleeps() {
        let config = RetryConfig::immediate(3);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(2), Duration::ZERO);
    }
}
