//! Retry policy.
//!
//! [`ProxyConfig`] is what callers hand to `get_proxy`; [`RetryPolicy`] is
//! the validated, immutable form every invocation through one provider
//! shares.

use proxyrpc_common::{ConfigError, Fault, OperationDescriptor};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay to wait after a failed attempt, before the next one.
#[derive(Clone)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same amount after every attempt.
    Fixed(Duration),
    /// Wait `initial * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
    /// Arbitrary attempt index to delay mapping.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Backoff::Custom(Arc::new(f))
    }

    /// Delay after the failed attempt with 1-based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let scaled = initial.as_nanos() as f64 * multiplier.powi(exponent);
                if !scaled.is_finite() || scaled >= max.as_nanos() as f64 {
                    *max
                } else {
                    Duration::from_nanos(scaled.max(0.0).round() as u64)
                }
            }
            Backoff::Custom(f) => f(attempt),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_millis(50),
            max: Duration::from_millis(5000),
            multiplier: 2.0,
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::None => f.write_str("None"),
            Backoff::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("max", max)
                .field("multiplier", multiplier)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Predicate deciding whether a fault may be retried.
pub type RetryPredicate = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

/// Default fault classification.
///
/// Transport failures, closed channels and failed channel creation are
/// transient. Faults reported by the remote service are business errors and
/// are not retried. Timeouts never reach the predicate; see
/// [`ProxyConfig::retry_on_timeout`].
pub fn default_classifier(fault: &Fault) -> bool {
    matches!(
        fault,
        Fault::Transport(_) | Fault::ChannelClosed(_) | Fault::ChannelCreation(_)
    )
}

/// Configuration for proxies obtained through `get_proxy`.
///
/// # Example
///
/// ```
/// use proxyrpc_client::{Backoff, ProxyConfig};
/// use std::time::Duration;
///
/// let config = ProxyConfig::default()
///     .with_max_attempts(3)
///     .with_backoff(Backoff::Fixed(Duration::from_millis(10)))
///     .with_per_attempt_timeout(Duration::from_secs(2))
///     .with_retry_on_timeout(true);
///
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Clone)]
pub struct ProxyConfig {
    /// Total attempts per call, first one included
    ///
    /// Default: 4
    pub max_attempts: u32,
    /// Default: exponential, 50ms doubling up to 5s
    pub backoff: Backoff,
    /// Default: [`default_classifier`]
    pub is_retryable: RetryPredicate,
    /// Deadline for a single attempt; `None` waits indefinitely
    pub per_attempt_timeout: Option<Duration>,
    /// Whether an expired attempt deadline may be retried
    ///
    /// Default: false
    pub retry_on_timeout: bool,
    /// Whether operations marked non-idempotent may be re-issued
    ///
    /// Default: false
    pub retry_non_idempotent: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Backoff::default(),
            is_retryable: Arc::new(default_classifier),
            per_attempt_timeout: None,
            retry_on_timeout: false,
            retry_non_idempotent: false,
        }
    }
}

impl ProxyConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_predicate(
        mut self,
        predicate: impl Fn(&Fault) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_retryable = Arc::new(predicate);
        self
    }

    pub fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    pub fn with_retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    pub fn with_retry_non_idempotent(mut self, retry: bool) -> Self {
        self.retry_non_idempotent = retry;
        self
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("per_attempt_timeout", &self.per_attempt_timeout)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .field("retry_non_idempotent", &self.retry_non_idempotent)
            .finish_non_exhaustive()
    }
}

/// Outcome of classifying a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Retryable,
    Terminal,
}

/// Validated retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: ProxyConfig,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// [`ConfigError::InvalidMaxAttempts`] if `max_attempts` is zero.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        if config.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.max_attempts));
        }
        Ok(Self { config })
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn per_attempt_timeout(&self) -> Option<Duration> {
        self.config.per_attempt_timeout
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.config.backoff.delay(attempt)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Classifies the fault produced by an attempt of `operation`.
    pub fn classify(&self, operation: &OperationDescriptor, fault: &Fault) -> FaultClass {
        let retryable = match fault {
            Fault::Timeout(_) => self.config.retry_on_timeout,
            other => (self.config.is_retryable)(other),
        };

        if !retryable {
            return FaultClass::Terminal;
        }
        if !operation.is_idempotent() && !self.config.retry_non_idempotent {
            return FaultClass::Terminal;
        }
        FaultClass::Retryable
    }
}
