// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration.

use std::{fmt, sync::Arc, time::Duration};

use crate::CacheHook;

/// Default time a secret's metadata is trusted before it is re-fetched.
pub const DEFAULT_CACHE_ITEM_TTL: Duration = Duration::from_millis(3_600_000);

/// Default number of secrets kept in the cache.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1024;

/// Default stage label resolved when no version is requested explicitly.
pub const DEFAULT_VERSION_STAGE: &str = "AWSCURRENT";

/// Number of versions cached per secret.
pub(crate) const MAX_VERSIONS_PER_SECRET: usize = 10;

/// Settings shared by every entry of a [`SecretCache`](crate::SecretCache).
///
/// The configuration is fixed once the cache is built.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use secret_cache::SecretCacheConfig;
///
/// let config = SecretCacheConfig::default();
/// assert_eq!(config.cache_item_ttl(), Duration::from_secs(3600));
/// assert_eq!(config.max_cache_size(), 1024);
/// assert_eq!(config.version_stage(), "AWSCURRENT");
/// assert!(config.hook().is_none());
/// ```
#[derive(Clone)]
pub struct SecretCacheConfig {
    pub(crate) cache_item_ttl: Duration,
    pub(crate) max_cache_size: usize,
    pub(crate) version_stage: String,
    pub(crate) hook: Option<Arc<dyn CacheHook>>,
}

impl Default for SecretCacheConfig {
    fn default() -> Self {
        Self {
            cache_item_ttl: DEFAULT_CACHE_ITEM_TTL,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            version_stage: DEFAULT_VERSION_STAGE.to_string(),
            hook: None,
        }
    }
}

impl fmt::Debug for SecretCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCacheConfig")
            .field("cache_item_ttl", &self.cache_item_ttl)
            .field("max_cache_size", &self.max_cache_size)
            .field("version_stage", &self.version_stage)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl SecretCacheConfig {
    /// How long fetched metadata is trusted, before jitter.
    ///
    /// Each successful metadata fetch picks its own deadline uniformly between
    /// half this value and this value plus one millisecond.
    #[must_use]
    pub fn cache_item_ttl(&self) -> Duration {
        self.cache_item_ttl
    }

    /// The maximum number of secrets kept in the cache.
    #[must_use]
    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    /// The stage label resolved by the plain getters.
    #[must_use]
    pub fn version_stage(&self) -> &str {
        &self.version_stage
    }

    /// The hook applied to cached items, if any.
    #[must_use]
    pub fn hook(&self) -> Option<&dyn CacheHook> {
        self.hook.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_size == 0 {
            return Err(ConfigError::caused_by("max_cache_size must be at least 1"));
        }

        if self.cache_item_ttl.is_zero() {
            return Err(ConfigError::caused_by("cache_item_ttl must be greater than zero"));
        }

        if self.version_stage.is_empty() {
            return Err(ConfigError::caused_by("version_stage must not be empty"));
        }

        Ok(())
    }
}

/// An invalid cache configuration was rejected by the builder.
#[ohno::error]
#[display("invalid secret cache configuration")]
pub struct ConfigError;

/// Chooses which version of a secret a read resolves to.
///
/// # Examples
///
/// ```
/// use secret_cache::VersionSelector;
///
/// assert_eq!(VersionSelector::stage("AWSPREVIOUS"), VersionSelector::Stage("AWSPREVIOUS".to_string()));
/// assert_eq!(VersionSelector::id("v1"), VersionSelector::Id("v1".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    /// The version currently labelled with this stage.
    Stage(String),
    /// The version with exactly this id.
    Id(String),
}

impl VersionSelector {
    /// Selects the version labelled with `stage`.
    #[must_use]
    pub fn stage(stage: impl Into<String>) -> Self {
        Self::Stage(stage.into())
    }

    /// Selects the version with id `version_id`.
    #[must_use]
    pub fn id(version_id: impl Into<String>) -> Self {
        Self::Id(version_id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SecretCacheConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = SecretCacheConfig {
            max_cache_size: 0,
            ..SecretCacheConfig::default()
        };

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("max_cache_size"), "{error}");
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = SecretCacheConfig {
            cache_item_ttl: Duration::ZERO,
            ..SecretCacheConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_stage_is_rejected() {
        let config = SecretCacheConfig {
            version_stage: String::new(),
            ..SecretCacheConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_reports_hook_presence_only() {
        let debug = format!("{:?}", SecretCacheConfig::default());

        assert!(debug.contains("max_cache_size: 1024"), "{debug}");
        assert!(debug.contains("hook: false"), "{debug}");
    }
}
