// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! The contract between `secret_cache` and a remote secret-management service.
//!
//! This crate defines the [`SecretsClient`] trait that a service adapter must
//! implement, the [`SecretMetadata`] and [`SecretValue`] responses it returns,
//! and the [`Error`] type shared by clients, cache hooks and the cache.
//!
//! # Classifying failures
//!
//! The cache retries [`ErrorKind::Service`] and [`ErrorKind::Client`] failures
//! lazily, with exponential backoff, and keeps serving the last good value while
//! they persist. Any [`ErrorKind::Other`] failure is returned to the caller
//! without touching cached state.
//!
//! # Testing
//!
//! Enable the `test-util` feature for [`testing::MockSecretsClient`], an
//! in-memory client that records calls and supports failure injection.

mod client;
pub mod error;
mod model;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use client::SecretsClient;
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use model::{SecretMetadata, SecretValue};
