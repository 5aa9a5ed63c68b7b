// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cached secret metadata and the versions resolved through it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use secret_cache_client::{Error, SecretMetadata, SecretValue, SecretsClient};

use crate::bounded::BoundedMap;
use crate::config::{MAX_VERSIONS_PER_SECRET, SecretCacheConfig, VersionSelector};
use crate::entry::{CacheEntry, Context, Fetch};
use crate::telemetry::{CacheActivity, CacheOperation};
use crate::version::VersionEntry;

pub(crate) struct MetadataFetch<C> {
    client: Arc<C>,
    secret_id: String,
}

impl<C: SecretsClient> Fetch for MetadataFetch<C> {
    type Output = SecretMetadata;

    fn fetch(&self) -> impl Future<Output = Result<SecretMetadata, Error>> + Send {
        self.client.describe_secret(&self.secret_id)
    }

    fn time_to_live(&self, config: &SecretCacheConfig) -> Option<Duration> {
        Some(config.cache_item_ttl())
    }

    fn operation(&self) -> CacheOperation {
        CacheOperation::DescribeSecret
    }

    fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

/// The cache entry of one secret.
///
/// Holds the secret's metadata, which maps version ids to stage labels, and a
/// bounded set of [`VersionEntry`] values for the versions read through it.
/// Metadata expires after a jittered share of the configured time to live;
/// version payloads do not expire.
///
/// Obtained through [`SecretCache::cached_secret`](crate::SecretCache::cached_secret).
pub struct SecretEntry<C: SecretsClient> {
    entry: CacheEntry<MetadataFetch<C>>,
    versions: Mutex<BoundedMap<String, Arc<VersionEntry<C>>>>,
    context: Arc<Context>,
}

impl<C: SecretsClient> SecretEntry<C> {
    pub(crate) fn new(client: Arc<C>, secret_id: impl Into<String>, context: Arc<Context>) -> Self {
        let fetch = MetadataFetch {
            client,
            secret_id: secret_id.into(),
        };

        Self {
            entry: CacheEntry::new(fetch, Arc::clone(&context)),
            versions: Mutex::new(BoundedMap::new(MAX_VERSIONS_PER_SECRET)),
            context,
        }
    }

    /// The id of the secret.
    #[must_use]
    pub fn secret_id(&self) -> &str {
        &self.entry.fetcher().secret_id
    }

    /// Returns the secret's metadata, fetching it if missing or expired.
    ///
    /// # Errors
    ///
    /// Returns the cached transient error while no metadata has been fetched
    /// yet, or any non-transient error from the client or the cache hook.
    pub async fn metadata(&self) -> Result<SecretMetadata, Error> {
        self.entry.get().await
    }

    /// Resolves `selector` to a version and returns its payload.
    ///
    /// Returns `Ok(None)` when no version carries the requested stage.
    ///
    /// # Errors
    ///
    /// Returns the cached transient error of the metadata or version fetch
    /// while nothing has been fetched yet, or any non-transient error.
    pub async fn get_secret_value(&self, selector: &VersionSelector) -> Result<Option<SecretValue>, Error> {
        let version_id = match selector {
            VersionSelector::Id(version_id) => version_id.clone(),
            VersionSelector::Stage(stage) => {
                let metadata = self.metadata().await?;
                match metadata.version_for_stage(stage) {
                    Some(version_id) => version_id.to_string(),
                    None => {
                        self.context
                            .telemetry
                            .record(CacheOperation::DescribeSecret, CacheActivity::Absent, self.secret_id(), None);
                        return Ok(None);
                    }
                }
            }
        };

        let version = self.version(&version_id);
        version.get_value().await.map(Some)
    }

    /// Re-fetches the metadata after a pacing pause of at least 3.5 seconds.
    ///
    /// On success every cached version is marked so its next read fetches
    /// the payload again. Returns `true` only if the refresh succeeded.
    ///
    /// # Errors
    ///
    /// Returns any non-transient error from the client or the cache hook.
    pub async fn refresh_now(&self) -> Result<bool, Error> {
        let refreshed = self.entry.force_refresh().await?;

        if refreshed {
            for version in self.versions.lock().values() {
                version.mark_refresh_needed();
            }
        }

        self.context.telemetry.record(
            CacheOperation::RefreshNow,
            if refreshed { CacheActivity::Refreshed } else { CacheActivity::Failed },
            self.secret_id(),
            None,
        );

        Ok(refreshed)
    }

    /// The number of versions currently cached for this secret.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.versions.lock().len()
    }

    /// Returns the cached entry for `version_id` without touching its recency.
    #[must_use]
    pub fn cached_version(&self, version_id: &str) -> Option<Arc<VersionEntry<C>>> {
        self.versions.lock().peek(version_id)
    }

    /// Whether metadata has been fetched.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.entry.has_result()
    }

    /// The error of the last metadata fetch, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.entry.last_error()
    }

    /// Consecutive failed metadata fetches since the last success.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.entry.failure_count()
    }

    /// Whether the next read will fetch metadata.
    #[must_use]
    pub fn is_refresh_needed(&self) -> bool {
        self.entry.is_refresh_needed()
    }

    fn version(&self, version_id: &str) -> Arc<VersionEntry<C>> {
        let lookup = self.versions.lock().get_or_insert_with(version_id, || {
            Arc::new(VersionEntry::new(
                Arc::clone(&self.entry.fetcher().client),
                self.secret_id(),
                version_id,
                Arc::clone(&self.context),
            ))
        });

        for _ in &lookup.evicted {
            self.context
                .telemetry
                .record(CacheOperation::Evict, CacheActivity::Evicted, self.secret_id(), None);
        }

        lookup.value
    }
}

impl<C: SecretsClient> fmt::Debug for SecretEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEntry")
            .field("entry", &self.entry)
            .field("version_count", &self.version_count())
            .finish_non_exhaustive()
    }
}
