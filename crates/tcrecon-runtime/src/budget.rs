//! Retry budgets: wall-clock ceilings and attempt cadence

use crate::call::OperationKind;
use std::time::Duration;
use tcrecon_config::RuntimeConfig;

/// Shortest delay ever waited between two attempts
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Wall-clock ceiling plus the delay policy between attempts.
///
/// The delay before retry `n` (0-indexed) is `interval * multiplier^n`, capped
/// at `max_interval` and never below [`MIN_RETRY_INTERVAL`]. A multiplier of 1.0
/// gives a fixed cadence, which is what convergence polling uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBudget {
    pub timeout: Duration,
    pub interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl RetryBudget {
    /// Fixed-cadence budget
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        let interval = interval.max(MIN_RETRY_INTERVAL);
        Self {
            timeout,
            interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    pub fn with_backoff(mut self, max_interval: Duration, multiplier: f64) -> Self {
        self.max_interval = max_interval.max(self.interval);
        self.multiplier = if multiplier.is_nan() { 1.0 } else { multiplier.max(1.0) };
        self
    }

    /// Same cadence, `factor` times the ceiling
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            timeout: self.timeout.saturating_mul(factor),
            ..*self
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(64) as i32;
        let secs = self.interval.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped).max(MIN_RETRY_INTERVAL)
    }
}

/// The two process-wide budgets plus the polling cadence.
///
/// Built once from [`RuntimeConfig`] and treated as read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budgets {
    pub read: RetryBudget,
    pub write: RetryBudget,
    pub poll_interval: Duration,
}

impl Budgets {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let interval = Duration::from_millis(config.retry_interval_ms);
        let max_interval = Duration::from_millis(config.max_retry_interval_ms);
        let read = RetryBudget::new(Duration::from_secs(config.read_retry_timeout_secs), interval)
            .with_backoff(max_interval, config.retry_multiplier);
        let write = RetryBudget::new(Duration::from_secs(config.write_retry_timeout_secs), interval)
            .with_backoff(max_interval, config.retry_multiplier);
        Self {
            read,
            write,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub fn for_kind(&self, kind: OperationKind) -> &RetryBudget {
        match kind {
            OperationKind::Read => &self.read,
            OperationKind::Write => &self.write,
        }
    }

    /// Fixed-cadence budget for convergence polling with the given ceiling
    pub fn poll(&self, timeout: Duration) -> RetryBudget {
        RetryBudget::new(timeout, self.poll_interval)
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}
