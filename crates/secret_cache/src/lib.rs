// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A client-side read-through cache for secrets held by a remote secret service.
//!
//! [`SecretCache`] sits in front of any [`SecretsClient`] and answers reads from
//! memory whenever it can:
//! - Secret metadata is refreshed after a jittered time to live, so fleets of
//!   processes do not refresh in lockstep
//! - Version payloads are immutable and cached until evicted
//! - Transient failures are cached and retried with exponential backoff while
//!   the last good value keeps being served
//! - One fetch per secret is in flight at a time, however many readers wait
//! - Both the secret map and each secret's version map are bounded and evict
//!   least recently used entries
//!
//! Time comes from an injected [`tick::Clock`], which makes every expiry and
//! backoff deterministic under `tick::ClockControl` in tests.
//!
//! # Examples
//!
//! ```
//! use secret_cache::{SecretCache, VersionSelector};
//! use secret_cache_client::testing::MockSecretsClient;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let client = MockSecretsClient::new();
//! client.set_current_string("api-key", "v1", "first");
//! client.set_current_string("api-key", "v2", "second");
//!
//! let cache = SecretCache::new(client, Clock::new_frozen());
//!
//! assert_eq!(cache.get_secret_string("api-key").await?.as_deref(), Some("second"));
//! assert_eq!(
//!     cache.get_secret_string_with("api-key", &VersionSelector::id("v1")).await?.as_deref(),
//!     Some("first")
//! );
//! assert_eq!(cache.get_secret_binary("api-key").await?, None);
//! # Ok::<(), secret_cache_client::Error>(())
//! # });
//! ```
//!
//! # Logging
//!
//! With the default `logs` feature, cache activity is emitted as `tracing`
//! events named `cache.event` with `cache.name`, `cache.operation`,
//! `cache.activity` and `secret.id` fields. Refreshes and evictions log at
//! `INFO`, cached failures at `WARN` and failures handed back to the caller at
//! `ERROR`.

mod backoff;
mod bounded;
mod builder;
mod cache;
mod config;
mod entry;
mod hook;
mod rnd;
mod secret;
mod telemetry;
mod version;

#[doc(inline)]
pub use backoff::RetryDelayPolicy;
#[doc(inline)]
pub use builder::SecretCacheBuilder;
#[doc(inline)]
pub use cache::SecretCache;
#[doc(inline)]
pub use config::{ConfigError, DEFAULT_CACHE_ITEM_TTL, DEFAULT_MAX_CACHE_SIZE, DEFAULT_VERSION_STAGE, SecretCacheConfig, VersionSelector};
#[doc(inline)]
pub use hook::{CacheHook, CachedItem, StoredItem};
#[doc(inline)]
pub use secret::SecretEntry;
#[doc(inline)]
pub use secret_cache_client::{Error, ErrorKind, Result, SecretMetadata, SecretValue, SecretsClient};
#[doc(inline)]
pub use telemetry::CacheName;
#[doc(inline)]
pub use version::VersionEntry;
