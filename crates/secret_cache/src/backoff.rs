// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Jittered delays for error backoff and forced-refresh pacing.

use std::cmp::min;
use std::time::Duration;

use crate::rnd::Rnd;

/// Initial wait after a failed fetch.
const ERROR_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Random spread added on top of every error backoff.
const ERROR_BACKOFF_VARIANCE: Duration = Duration::from_millis(1000);

/// Longest wait between two failed fetches of the same entry.
const ERROR_BACKOFF_PLATEAU: Duration = Duration::from_millis(128 * 1000);

/// Minimum pause before a forced refresh.
const FORCED_REFRESH_BASE: Duration = Duration::from_millis(3500);

/// Random spread added to the forced-refresh pause.
const FORCED_REFRESH_VARIANCE: Duration = Duration::from_millis(1000);

/// Growth factor between consecutive attempts.
const EXPONENTIAL_FACTOR: f64 = 2.0;

/// Computes jittered delays as a function of the attempt number.
///
/// The delay for attempt `n` (counting from 1) is
/// `base * 2^(n - 1) + uniform[0, variance)`, clamped to the optional maximum.
/// Attempt `0` is treated as attempt `1`.
///
/// The cache uses two policies: [`RetryDelayPolicy::error_backoff`] spaces out
/// retries of a failing entry and [`RetryDelayPolicy::forced_refresh`] paces
/// explicit refresh requests.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use secret_cache::RetryDelayPolicy;
///
/// let policy = RetryDelayPolicy::error_backoff();
///
/// let first = policy.delay(1);
/// assert!(first >= Duration::from_secs(1) && first < Duration::from_secs(2));
/// assert_eq!(policy.delay(20), Duration::from_secs(128));
/// ```
#[derive(Debug, Clone)]
pub struct RetryDelayPolicy {
    base: Duration,
    variance: Duration,
    max_delay: Option<Duration>,
    rnd: Rnd,
}

impl RetryDelayPolicy {
    /// Creates a policy with the given base delay, jitter variance and optional cap.
    #[must_use]
    pub fn new(base: Duration, variance: Duration, max_delay: Option<Duration>) -> Self {
        Self {
            base,
            variance,
            max_delay,
            rnd: Rnd::default(),
        }
    }

    /// The policy applied after failed fetches.
    ///
    /// Starts at 1 s, doubles per consecutive failure and plateaus at 128 s,
    /// with up to 1 s of jitter.
    #[must_use]
    pub fn error_backoff() -> Self {
        Self::new(ERROR_BACKOFF_BASE, ERROR_BACKOFF_VARIANCE, Some(ERROR_BACKOFF_PLATEAU))
    }

    /// The pause applied before a forced refresh: 3.5 s plus up to 1 s of jitter.
    #[must_use]
    pub fn forced_refresh() -> Self {
        Self::new(FORCED_REFRESH_BASE, FORCED_REFRESH_VARIANCE, None)
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    /// Returns the delay before attempt `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let growth = duration_mul_pow2(self.base, exponent);
        let jitter = secs_to_duration_saturating(self.variance.as_secs_f64() * self.rnd.next_f64());

        clamp_to_max(growth.saturating_add(jitter), self.max_delay)
    }
}

fn clamp_to_max(d: Duration, max: Option<Duration>) -> Duration {
    max.map_or(d, |m| min(d, m))
}

fn duration_mul_pow2(base: Duration, exponent: u32) -> Duration {
    let factor = EXPONENTIAL_FACTOR.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
    secs_to_duration_saturating(base.as_secs_f64() * factor)
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
