// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pluggable transformation of cached items.

use std::{any::Any, fmt, sync::Arc};

use secret_cache_client::{Error, SecretMetadata, SecretValue};

/// The representation a [`CacheHook`] stores in place of an item.
pub type StoredItem = Arc<dyn Any + Send + Sync>;

/// An item about to be cached, or read back from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedItem {
    /// The metadata of a secret.
    Metadata(SecretMetadata),
    /// The payload of one secret version.
    Value(SecretValue),
}

impl From<SecretMetadata> for CachedItem {
    fn from(metadata: SecretMetadata) -> Self {
        Self::Metadata(metadata)
    }
}

impl From<SecretValue> for CachedItem {
    fn from(value: SecretValue) -> Self {
        Self::Value(value)
    }
}

/// Transforms items on their way into and out of the cache.
///
/// `put` runs once per successful fetch and `get` runs once per read. A hook can
/// encrypt payloads at rest, move them to another store, or count accesses.
/// Errors from either side are returned to the caller unchanged and never
/// cached.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use secret_cache::{CacheHook, CachedItem, StoredItem};
/// use secret_cache_client::Error;
///
/// #[derive(Debug)]
/// struct Passthrough;
///
/// impl CacheHook for Passthrough {
///     fn put(&self, item: CachedItem) -> Result<StoredItem, Error> {
///         Ok(Arc::new(item))
///     }
///
///     fn get(&self, stored: &StoredItem) -> Result<CachedItem, Error> {
///         stored
///             .downcast_ref::<CachedItem>()
///             .cloned()
///             .ok_or_else(|| Error::other("unexpected stored item"))
///     }
/// }
/// ```
pub trait CacheHook: Send + Sync {
    /// Converts an item into the representation kept in the cache.
    ///
    /// # Errors
    ///
    /// Any error is returned to the caller and the fetched item is discarded.
    fn put(&self, item: CachedItem) -> Result<StoredItem, Error>;

    /// Converts a stored representation back into the item.
    ///
    /// # Errors
    ///
    /// Any error is returned to the caller; the stored representation is kept.
    fn get(&self, stored: &StoredItem) -> Result<CachedItem, Error>;
}

/// Types an entry can cache.
pub(crate) trait Cacheable: Clone + Send + Sync + 'static {
    fn into_item(self) -> CachedItem;

    fn from_item(item: CachedItem) -> Option<Self>;
}

impl Cacheable for SecretMetadata {
    fn into_item(self) -> CachedItem {
        CachedItem::Metadata(self)
    }

    fn from_item(item: CachedItem) -> Option<Self> {
        match item {
            CachedItem::Metadata(metadata) => Some(metadata),
            CachedItem::Value(_) => None,
        }
    }
}

impl Cacheable for SecretValue {
    fn into_item(self) -> CachedItem {
        CachedItem::Value(self)
    }

    fn from_item(item: CachedItem) -> Option<Self> {
        match item {
            CachedItem::Value(value) => Some(value),
            CachedItem::Metadata(_) => None,
        }
    }
}

/// What an entry actually keeps: the item itself, or what the hook made of it.
#[derive(Clone)]
pub(crate) enum Slot<T> {
    Plain(T),
    Hooked(StoredItem),
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads stay out of debug output.
        match self {
            Self::Plain(_) => f.write_str("Plain(..)"),
            Self::Hooked(_) => f.write_str("Hooked(..)"),
        }
    }
}

impl<T: Cacheable> Slot<T> {
    pub fn store(item: T, hook: Option<&dyn CacheHook>) -> Result<Self, Error> {
        match hook {
            Some(hook) => hook.put(item.into_item()).map(Self::Hooked),
            None => Ok(Self::Plain(item)),
        }
    }

    pub fn load(&self, hook: Option<&dyn CacheHook>) -> Result<T, Error> {
        match (self, hook) {
            (Self::Plain(item), _) => Ok(item.clone()),
            (Self::Hooked(stored), Some(hook)) => {
                T::from_item(hook.get(stored)?).ok_or_else(|| Error::other("cache hook returned an item of the wrong kind"))
            }
            (Self::Hooked(_), None) => Err(Error::other("cached item needs a cache hook to be read")),
        }
    }
}
