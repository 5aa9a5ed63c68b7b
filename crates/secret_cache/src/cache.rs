// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use secret_cache_client::{Error, SecretValue, SecretsClient};
use tick::Clock;

use crate::bounded::BoundedMap;
use crate::entry::Context;
use crate::telemetry::{CacheActivity, CacheName, CacheOperation, DEFAULT_CACHE_NAME, Telemetry};
use crate::{SecretCacheBuilder, SecretCacheConfig, SecretEntry, VersionSelector};

/// A read-through cache of secrets held by a remote secret service.
///
/// Reads go to the service only when the cached copy is missing or stale:
///
/// - Secret metadata, which tells which version carries which stage, expires
///   at a random point between half the configured time to live and the full
///   time to live after it was fetched.
/// - Version payloads never expire on their own.
/// - Transient failures are cached and retried with exponential backoff;
///   meanwhile the last good value keeps being served.
/// - Concurrent readers of one secret share a single in-flight fetch.
///
/// The cache holds at most `max_cache_size` secrets and up to ten versions per
/// secret; the least recently used entries are evicted when an insert
/// overflows either bound.
///
/// # Examples
///
/// ```
/// use secret_cache::SecretCache;
/// use secret_cache_client::testing::MockSecretsClient;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let client = MockSecretsClient::new();
/// client.set_current_string("db-password", "v1", "hunter2");
///
/// let cache = SecretCache::new(client.clone(), Clock::new_frozen());
///
/// let password = cache.get_secret_string("db-password").await?;
/// assert_eq!(password.as_deref(), Some("hunter2"));
///
/// // The second read is served from the cache.
/// cache.get_secret_string("db-password").await?;
/// assert_eq!(client.call_count(), 2);
/// # Ok::<(), secret_cache_client::Error>(())
/// # });
/// ```
pub struct SecretCache<C: SecretsClient> {
    client: Arc<C>,
    context: Arc<Context>,
    secrets: Mutex<BoundedMap<String, Arc<SecretEntry<C>>>>,
}

impl<C: SecretsClient> SecretCache<C> {
    /// Creates a cache builder around `client`.
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
    ///     .cache_item_ttl(Duration::from_secs(60))
    ///     .build()?;
    /// # Ok::<(), secret_cache::ConfigError>(())
    /// ```
    #[must_use]
    pub fn builder(client: C, clock: Clock) -> SecretCacheBuilder<C> {
        SecretCacheBuilder::new(Arc::new(client), clock)
    }

    /// Creates a cache with the default configuration.
    #[must_use]
    pub fn new(client: C, clock: Clock) -> Self {
        let context = Context::new(
            SecretCacheConfig::default(),
            clock,
            Telemetry::new(DEFAULT_CACHE_NAME, cfg!(feature = "logs")),
        );

        Self::from_parts(Arc::new(client), Arc::new(context))
    }

    pub(crate) fn from_parts(client: Arc<C>, context: Arc<Context>) -> Self {
        let secrets = BoundedMap::new(context.config.max_cache_size());

        Self {
            client,
            context,
            secrets: Mutex::new(secrets),
        }
    }

    /// Returns the string payload of the version carrying the configured stage.
    ///
    /// Returns `Ok(None)` when no version carries the stage or the payload is
    /// binary.
    ///
    /// # Errors
    ///
    /// Returns the cached transient error while the secret has never been
    /// fetched successfully, or any non-transient error.
    pub async fn get_secret_string(&self, secret_id: &str) -> Result<Option<String>, Error> {
        self.get_secret_string_with(secret_id, &self.default_selector()).await
    }

    /// Returns the string payload of the version chosen by `selector`.
    ///
    /// # Errors
    ///
    /// See [`get_secret_string`](Self::get_secret_string).
    pub async fn get_secret_string_with(&self, secret_id: &str, selector: &VersionSelector) -> Result<Option<String>, Error> {
        let value = self.get_secret_value_with(secret_id, selector).await?;
        Ok(value.and_then(SecretValue::into_secret_string))
    }

    /// Returns the binary payload of the version carrying the configured stage.
    ///
    /// Returns `Ok(None)` when no version carries the stage or the payload is
    /// a string.
    ///
    /// # Errors
    ///
    /// See [`get_secret_string`](Self::get_secret_string).
    pub async fn get_secret_binary(&self, secret_id: &str) -> Result<Option<Vec<u8>>, Error> {
        self.get_secret_binary_with(secret_id, &self.default_selector()).await
    }

    /// Returns the binary payload of the version chosen by `selector`.
    ///
    /// # Errors
    ///
    /// See [`get_secret_string`](Self::get_secret_string).
    pub async fn get_secret_binary_with(&self, secret_id: &str, selector: &VersionSelector) -> Result<Option<Vec<u8>>, Error> {
        let value = self.get_secret_value_with(secret_id, selector).await?;
        Ok(value.and_then(SecretValue::into_secret_binary))
    }

    /// Returns the whole version carrying the configured stage.
    ///
    /// # Errors
    ///
    /// See [`get_secret_string`](Self::get_secret_string).
    pub async fn get_secret_value(&self, secret_id: &str) -> Result<Option<SecretValue>, Error> {
        self.get_secret_value_with(secret_id, &self.default_selector()).await
    }

    /// Returns the whole version chosen by `selector`.
    ///
    /// # Errors
    ///
    /// See [`get_secret_string`](Self::get_secret_string).
    pub async fn get_secret_value_with(&self, secret_id: &str, selector: &VersionSelector) -> Result<Option<SecretValue>, Error> {
        self.cached_secret(secret_id).get_secret_value(selector).await
    }

    /// Re-fetches a secret's metadata now instead of waiting for it to expire.
    ///
    /// The call first pauses for 3.5 to 4.5 seconds, or until the secret's
    /// error backoff has passed if that is later, so that repeated calls
    /// cannot flood the service. On success the cached versions are fetched
    /// again on their next read.
    ///
    /// Returns `true` only if the refresh succeeded.
    ///
    /// # Errors
    ///
    /// Returns any non-transient error from the client or the cache hook.
    pub async fn refresh_now(&self, secret_id: &str) -> Result<bool, Error> {
        self.cached_secret(secret_id).refresh_now().await
    }

    /// Returns the entry of `secret_id`, creating an empty one if needed.
    ///
    /// Creating an entry may evict the least recently used ones.
    #[must_use]
    pub fn cached_secret(&self, secret_id: &str) -> Arc<SecretEntry<C>> {
        let lookup = self.secrets.lock().get_or_insert_with(secret_id, || {
            Arc::new(SecretEntry::new(Arc::clone(&self.client), secret_id, Arc::clone(&self.context)))
        });

        for (evicted, _) in &lookup.evicted {
            self.context
                .telemetry
                .record(CacheOperation::Evict, CacheActivity::Evicted, evicted, None);
        }

        lookup.value
    }

    /// The number of secrets in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.lock().len()
    }

    /// Whether the cache holds no secrets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.lock().is_empty()
    }

    /// Drops every cached secret.
    ///
    /// Entries still referenced elsewhere stay usable but are no longer
    /// reachable through the cache.
    pub fn clear(&self) {
        self.secrets.lock().clear();
    }

    /// The configuration the cache was built with.
    #[must_use]
    pub fn config(&self) -> &SecretCacheConfig {
        &self.context.config
    }

    /// Returns a reference to the cache's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.context.clock
    }

    /// The client used for remote calls.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the name of this cache for log events.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.context.telemetry.name()
    }

    fn default_selector(&self) -> VersionSelector {
        VersionSelector::stage(self.context.config.version_stage())
    }
}

impl<C: SecretsClient> fmt::Debug for SecretCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCache")
            .field("name", &self.context.telemetry.name())
            .field("config", &self.context.config)
            .field("len", &self.secrets.lock().len())
            .finish_non_exhaustive()
    }
}
