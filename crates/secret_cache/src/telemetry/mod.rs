// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for cache activity.
//!
//! With the `logs` feature enabled, and logging switched on in the builder,
//! every refresh, failure, eviction and cache hit is emitted as a `tracing`
//! event named `cache.event`. Without the feature, recording compiles to nothing.

use std::time::Duration;

pub(crate) mod attributes;
#[cfg(test)]
pub(crate) mod testing;

/// Name identifying a cache instance in log events.
pub type CacheName = &'static str;

/// The name used when the builder is not given one.
pub(crate) const DEFAULT_CACHE_NAME: CacheName = "secret_cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    DescribeSecret,
    GetSecretValue,
    RefreshNow,
    Evict,
}

impl CacheOperation {
    #[cfg(any(feature = "logs", test))]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DescribeSecret => "secret.describe",
            Self::GetSecretValue => "secret.get_value",
            Self::RefreshNow => "secret.refresh_now",
            Self::Evict => "secret.evict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    /// Served from the cache without a fetch.
    Hit,
    /// A cached failure was returned while the entry waits out its backoff.
    BackingOff,
    /// A fetch succeeded and replaced the cached item.
    Refreshed,
    /// A fetch failed with a transient error; the entry is backing off.
    Failed,
    /// A failure that is not cached was returned to the caller.
    Unexpected,
    /// No version matched the requested stage.
    Absent,
    /// An entry was dropped to keep the cache within its capacity.
    Evicted,
}

impl CacheActivity {
    #[cfg(any(feature = "logs", test))]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::BackingOff => "cache.backing_off",
            Self::Refreshed => "cache.refreshed",
            Self::Failed => "cache.failed",
            Self::Unexpected => "cache.unexpected",
            Self::Absent => "cache.absent",
            Self::Evicted => "cache.evicted",
        }
    }

    #[cfg(any(feature = "logs", test))]
    pub fn level(self) -> tracing::Level {
        match self {
            Self::Hit | Self::BackingOff | Self::Absent => tracing::Level::DEBUG,
            Self::Refreshed | Self::Evicted => tracing::Level::INFO,
            Self::Failed => tracing::Level::WARN,
            Self::Unexpected => tracing::Level::ERROR,
        }
    }
}

/// Records cache activity for one cache instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Telemetry {
    name: CacheName,
    #[cfg_attr(not(any(feature = "logs", test)), expect(dead_code, reason = "only read when logs are compiled in"))]
    logging_enabled: bool,
}

impl Telemetry {
    pub fn new(name: CacheName, logging_enabled: bool) -> Self {
        Self { name, logging_enabled }
    }

    pub fn name(&self) -> CacheName {
        self.name
    }

    #[cfg_attr(not(any(feature = "logs", test)), expect(unused_variables, reason = "No-op when logs are disabled"))]
    pub fn record(&self, operation: CacheOperation, activity: CacheActivity, secret_id: &str, duration: Option<Duration>) {
        #[cfg(any(feature = "logs", test))]
        if self.logging_enabled {
            Self::emit(self.name, operation, activity, secret_id, duration);
        }
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, secret_id: &str, duration: Option<Duration>) {
        let op = operation.as_str();
        let ev = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing level must be constant, so we use a macro to select the appropriate level.
        // Field names must match constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = ev,
                    secret.id = secret_id,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.level() {
            tracing::Level::ERROR => emit_event!(error),
            tracing::Level::WARN => emit_event!(warn),
            tracing::Level::INFO => emit_event!(info),
            _ => emit_event!(debug),
        }
    }
}
