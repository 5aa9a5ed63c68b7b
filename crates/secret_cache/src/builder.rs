// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`SecretCache`].

use std::sync::Arc;
use std::time::Duration;

use secret_cache_client::SecretsClient;
use tick::Clock;

#[cfg(test)]
use crate::rnd::Rnd;
use crate::telemetry::{CacheName, DEFAULT_CACHE_NAME, Telemetry};
use crate::{CacheHook, ConfigError, SecretCache, SecretCacheConfig};

/// Configures and creates a [`SecretCache`].
///
/// Created by [`SecretCache::builder`]. Every setting starts at the default of
/// [`SecretCacheConfig`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use secret_cache::SecretCache;
/// use secret_cache_client::testing::MockSecretsClient;
/// use tick::Clock;
///
/// let cache = SecretCache::builder(MockSecretsClient::new(), Clock::new_frozen())
///     .cache_item_ttl(Duration::from_secs(300))
///     .max_cache_size(64)
///     .build()?;
///
/// assert_eq!(cache.config().max_cache_size(), 64);
/// # Ok::<(), secret_cache::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct SecretCacheBuilder<C> {
    client: Arc<C>,
    clock: Clock,
    config: SecretCacheConfig,
    name: CacheName,
    logs_enabled: bool,
    #[cfg(test)]
    rnd: Option<Rnd>,
}

impl<C: SecretsClient> SecretCacheBuilder<C> {
    pub(crate) fn new(client: Arc<C>, clock: Clock) -> Self {
        Self {
            client,
            clock,
            config: SecretCacheConfig::default(),
            name: DEFAULT_CACHE_NAME,
            logs_enabled: cfg!(feature = "logs"),
            #[cfg(test)]
            rnd: None,
        }
    }

    /// Sets how long fetched metadata is trusted before jitter is applied.
    #[must_use]
    pub fn cache_item_ttl(mut self, ttl: impl Into<Duration>) -> Self {
        self.config.cache_item_ttl = ttl.into();
        self
    }

    /// Sets the maximum number of secrets kept in the cache.
    ///
    /// Must be at least 1; [`build`](Self::build) rejects 0.
    #[must_use]
    pub fn max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.config.max_cache_size = max_cache_size;
        self
    }

    /// Sets the stage label resolved by the plain getters.
    #[must_use]
    pub fn version_stage(mut self, stage: impl Into<String>) -> Self {
        self.config.version_stage = stage.into();
        self
    }

    /// Routes every cached item through `hook`.
    #[must_use]
    pub fn hook(mut self, hook: impl CacheHook + 'static) -> Self {
        self.config.hook = Some(Arc::new(hook));
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SecretCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the name reported in log events.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Turns log events on or off. They are on by default.
    #[cfg(any(feature = "logs", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
    #[must_use]
    pub fn enable_logs(mut self, enabled: bool) -> Self {
        self.logs_enabled = enabled;
        self
    }

    /// Returns a reference to the builder's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = Some(rnd);
        self
    }

    /// Validates the configuration and creates the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `max_cache_size` is 0, the time to live is
    /// zero, or the version stage is empty.
    pub fn build(self) -> Result<SecretCache<C>, ConfigError> {
        self.config.validate()?;

        let telemetry = Telemetry::new(self.name, self.logs_enabled);
        let context = crate::entry::Context::new(self.config, self.clock, telemetry);

        #[cfg(test)]
        let context = match self.rnd {
            Some(rnd) => context.with_rnd(rnd),
            None => context,
        };

        Ok(SecretCache::from_parts(self.client, Arc::new(context)))
    }
}
