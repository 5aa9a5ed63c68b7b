// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use secret_cache_client::{Error, SecretValue, SecretsClient};

use crate::entry::{CacheEntry, Context, Fetch};
use crate::telemetry::CacheOperation;

pub(crate) struct VersionFetch<C> {
    client: Arc<C>,
    secret_id: String,
    version_id: String,
}

impl<C: SecretsClient> Fetch for VersionFetch<C> {
    type Output = SecretValue;

    fn fetch(&self) -> impl Future<Output = Result<SecretValue, Error>> + Send {
        self.client.get_secret_value(&self.secret_id, &self.version_id)
    }

    fn operation(&self) -> CacheOperation {
        CacheOperation::GetSecretValue
    }

    fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

/// The cached payload of one version of a secret.
///
/// A version's payload never changes, so the entry has no expiry. It is
/// fetched again only to retry a failure, or after a successful
/// [`refresh_now`](crate::SecretCache::refresh_now) of its secret.
///
/// Two entries are equal when they cache the same version of the same secret.
pub struct VersionEntry<C: SecretsClient> {
    entry: CacheEntry<VersionFetch<C>>,
}

impl<C: SecretsClient> VersionEntry<C> {
    pub(crate) fn new(client: Arc<C>, secret_id: impl Into<String>, version_id: impl Into<String>, context: Arc<Context>) -> Self {
        let fetch = VersionFetch {
            client,
            secret_id: secret_id.into(),
            version_id: version_id.into(),
        };

        Self {
            entry: CacheEntry::new(fetch, context),
        }
    }

    /// The secret this version belongs to.
    #[must_use]
    pub fn secret_id(&self) -> &str {
        &self.entry.fetcher().secret_id
    }

    /// The version id.
    #[must_use]
    pub fn version_id(&self) -> &str {
        &self.entry.fetcher().version_id
    }

    /// Returns the version's payload, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Returns the cached transient error while no payload has been fetched
    /// yet, or any non-transient error from the client or the cache hook.
    pub async fn get_value(&self) -> Result<SecretValue, Error> {
        self.entry.get().await
    }

    /// Whether a payload has been fetched.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.entry.has_result()
    }

    /// The error of the last fetch, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.entry.last_error()
    }

    /// Consecutive failed fetches since the last success.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.entry.failure_count()
    }

    /// Whether the next read will fetch.
    #[must_use]
    pub fn is_refresh_needed(&self) -> bool {
        self.entry.is_refresh_needed()
    }

    pub(crate) fn mark_refresh_needed(&self) {
        self.entry.mark_refresh_needed();
    }
}

impl<C: SecretsClient> fmt::Debug for VersionEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionEntry")
            .field("version_id", &self.version_id())
            .field("entry", &self.entry)
            .finish()
    }
}

impl<C: SecretsClient> PartialEq for VersionEntry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.secret_id() == other.secret_id() && self.version_id() == other.version_id()
    }
}

impl<C: SecretsClient> Eq for VersionEntry<C> {}

impl<C: SecretsClient> Hash for VersionEntry<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.secret_id().hash(state);
        self.version_id().hash(state);
    }
}
