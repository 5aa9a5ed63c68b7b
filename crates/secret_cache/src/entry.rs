// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The refresh state machine shared by every cached object.

use std::cmp::max;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use secret_cache_client::Error;
use tick::Clock;

use crate::backoff::RetryDelayPolicy;
use crate::config::SecretCacheConfig;
use crate::hook::{Cacheable, Slot};
use crate::rnd::Rnd;
use crate::telemetry::{CacheActivity, CacheOperation, Telemetry};

/// How an entry obtains a fresh copy of its item.
pub(crate) trait Fetch: Send + Sync {
    type Output: Cacheable;

    fn fetch(&self) -> impl Future<Output = Result<Self::Output, Error>> + Send;

    /// The nominal lifetime of a fetched item; `None` means it never expires.
    fn time_to_live(&self, _config: &SecretCacheConfig) -> Option<Duration> {
        None
    }

    fn operation(&self) -> CacheOperation;

    fn secret_id(&self) -> &str;
}

/// Everything entries of one cache share.
#[derive(Debug)]
pub(crate) struct Context {
    pub config: SecretCacheConfig,
    pub clock: Clock,
    pub error_backoff: RetryDelayPolicy,
    pub forced_refresh: RetryDelayPolicy,
    pub rnd: Rnd,
    pub telemetry: Telemetry,
}

impl Context {
    pub fn new(config: SecretCacheConfig, clock: Clock, telemetry: Telemetry) -> Self {
        Self {
            config,
            clock,
            error_backoff: RetryDelayPolicy::error_backoff(),
            forced_refresh: RetryDelayPolicy::forced_refresh(),
            rnd: Rnd::default(),
            telemetry,
        }
    }

    #[cfg(test)]
    pub fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.error_backoff = self.error_backoff.with_rnd(rnd.clone());
        self.forced_refresh = self.forced_refresh.with_rnd(rnd.clone());
        self.rnd = rnd;
        self
    }

    /// A deadline between `ttl / 2` and `ttl + 1ms` after `now`, or `None` if it overflows.
    fn jittered_deadline(&self, now: Instant, ttl: Duration) -> Option<Instant> {
        let half = ttl / 2;
        let spread = half.saturating_add(Duration::from_millis(1)).mul_f64(self.rnd.next_f64());

        now.checked_add(half.saturating_add(spread))
    }
}

struct EntryState<T> {
    slot: Option<Slot<T>>,
    last_error: Option<Error>,
    failure_count: u32,
    next_retry_allowed_at: Option<Instant>,
    expires_at: Option<Instant>,
    refresh_needed: bool,
    // Bumped on every mark so a fetch that was already running does not swallow it.
    refresh_marks: u64,
}

impl<T> EntryState<T> {
    fn new() -> Self {
        Self {
            slot: None,
            last_error: None,
            failure_count: 0,
            next_retry_allowed_at: None,
            expires_at: None,
            refresh_needed: true,
            refresh_marks: 0,
        }
    }

    fn is_refresh_needed(&self, now: Instant) -> bool {
        if self.refresh_needed {
            return true;
        }

        if self.last_error.is_some() {
            return self.next_retry_allowed_at.is_none_or(|at| now >= at);
        }

        self.expires_at.is_some_and(|at| now > at)
    }

    fn remaining_backoff(&self, now: Instant) -> Duration {
        match (&self.last_error, self.next_retry_allowed_at) {
            (Some(_), Some(at)) => at.saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }
}

impl<T> fmt::Debug for EntryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryState")
            .field("has_result", &self.slot.is_some())
            .field("last_error", &self.last_error)
            .field("failure_count", &self.failure_count)
            .field("next_retry_allowed_at", &self.next_retry_allowed_at)
            .field("expires_at", &self.expires_at)
            .field("refresh_needed", &self.refresh_needed)
            .finish_non_exhaustive()
    }
}

/// One cached object together with its refresh bookkeeping.
///
/// `fetch_lock` serializes refreshes, so at most one fetch per entry is in
/// flight. The state is only written while `fetch_lock` is held, and only once
/// a fetch has resolved: dropping a future mid-fetch leaves the entry as it
/// was. The state mutex is never held across an await.
pub(crate) struct CacheEntry<F: Fetch> {
    fetcher: F,
    context: Arc<Context>,
    fetch_lock: futures::lock::Mutex<()>,
    state: Mutex<EntryState<F::Output>>,
}

impl<F: Fetch> fmt::Debug for CacheEntry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("secret_id", &self.fetcher.secret_id())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<F: Fetch> CacheEntry<F> {
    pub fn new(fetcher: F, context: Arc<Context>) -> Self {
        Self {
            fetcher,
            context,
            fetch_lock: futures::lock::Mutex::new(()),
            state: Mutex::new(EntryState::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the cached item, refreshing it first when it is stale.
    ///
    /// A stale item is still returned when the refresh fails with a transient
    /// error; the error itself is returned only while no item was ever fetched.
    pub async fn get(&self) -> Result<F::Output, Error> {
        let _guard = self.fetch_lock.lock().await;

        let refreshed = self.refresh(false).await?;
        let read = self.read();

        if !refreshed {
            let activity = match &read {
                Ok(_) => CacheActivity::Hit,
                Err(_) if !self.has_result() => CacheActivity::BackingOff,
                Err(_) => CacheActivity::Unexpected,
            };
            self.record(activity, None);
        }

        read
    }

    /// Refreshes regardless of staleness after a pacing pause.
    ///
    /// The pause is the forced-refresh delay, or the remaining error backoff
    /// if that is longer, and is spent without holding the fetch lock.
    /// Returns `true` only when the refresh succeeded.
    pub async fn force_refresh(&self) -> Result<bool, Error> {
        let pause = {
            let now = self.context.clock.instant();
            let state = self.state.lock();
            max(self.context.forced_refresh.delay(1), state.remaining_backoff(now))
        };

        self.context.clock.delay(pause).await;

        let _guard = self.fetch_lock.lock().await;
        let refreshed = self.refresh(true).await?;

        Ok(refreshed && self.state.lock().last_error.is_none())
    }

    /// Makes the next read fetch again, whatever the current state.
    pub fn mark_refresh_needed(&self) {
        let mut state = self.state.lock();
        state.refresh_needed = true;
        state.refresh_marks = state.refresh_marks.wrapping_add(1);
    }

    pub fn is_refresh_needed(&self) -> bool {
        self.state.lock().is_refresh_needed(self.context.clock.instant())
    }

    pub fn has_result(&self) -> bool {
        self.state.lock().slot.is_some()
    }

    pub fn last_error(&self) -> Option<Error> {
        self.state.lock().last_error.clone()
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Runs a fetch when one is needed or `force` is set.
    ///
    /// Returns `Ok(true)` when a fetch ran and its outcome was cached, which
    /// includes transient failures. Any other failure is returned without
    /// touching the state. Must be called with `fetch_lock` held.
    async fn refresh(&self, force: bool) -> Result<bool, Error> {
        let clock = &self.context.clock;
        let started = clock.instant();

        let (needed, marks) = {
            let state = self.state.lock();
            (force || state.is_refresh_needed(started), state.refresh_marks)
        };

        if !needed {
            return Ok(false);
        }

        let fetched = self.fetcher.fetch().await;
        let now = clock.instant();
        let elapsed = Some(now.saturating_duration_since(started));

        let item = match fetched {
            Ok(item) => item,
            Err(error) if error.is_transient() => {
                self.fail(error, now, marks);
                self.record(CacheActivity::Failed, elapsed);
                return Ok(true);
            }
            Err(error) => {
                self.record(CacheActivity::Unexpected, elapsed);
                return Err(error);
            }
        };

        let slot = Slot::store(item, self.context.config.hook()).inspect_err(|_| self.record(CacheActivity::Unexpected, elapsed))?;
        let expires_at = self
            .fetcher
            .time_to_live(&self.context.config)
            .and_then(|ttl| self.context.jittered_deadline(now, ttl));

        {
            let mut state = self.state.lock();
            state.slot = Some(slot);
            state.last_error = None;
            state.failure_count = 0;
            state.next_retry_allowed_at = None;
            state.expires_at = expires_at;
            state.refresh_needed = state.refresh_marks != marks;
        }

        self.record(CacheActivity::Refreshed, elapsed);
        Ok(true)
    }

    fn fail(&self, error: Error, now: Instant, marks: u64) {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.next_retry_allowed_at = now.checked_add(self.context.error_backoff.delay(state.failure_count));
        state.last_error = Some(error);
        state.refresh_needed = state.refresh_marks != marks;
    }

    fn read(&self) -> Result<F::Output, Error> {
        let (slot, error) = {
            let state = self.state.lock();
            (state.slot.clone(), state.last_error.clone())
        };

        match (slot, error) {
            (Some(slot), _) => slot.load(self.context.config.hook()),
            (None, Some(error)) => Err(error),
            (None, None) => Err(Error::other("cache entry holds neither an item nor an error")),
        }
    }

    fn record(&self, activity: CacheActivity, duration: Option<Duration>) {
        self.context
            .telemetry
            .record(self.fetcher.operation(), activity, self.fetcher.secret_id(), duration);
    }
}
