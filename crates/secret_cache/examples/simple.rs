// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simple Secret Cache Example
//!
//! Reads a secret through the cache and shows that repeated reads stay local.

use std::time::Duration;

use secret_cache::{SecretCache, VersionSelector};
use secret_cache_client::testing::MockSecretsClient;
use tick::Clock;

#[tokio::main]
async fn main() {
    let clock = Clock::new_tokio();

    // Stands in for the remote secret service.
    let client = MockSecretsClient::new();
    client.set_current_string("db-password", "v1", "hunter2");
    client.set_current_binary("tls-key", "k1", vec![0x30, 0x82]);

    let cache = SecretCache::builder(client.clone(), clock)
        .cache_item_ttl(Duration::from_secs(300))
        .max_cache_size(16)
        .build()
        .expect("valid configuration");

    // First read describes the secret and fetches the current version
    let password = cache.get_secret_string("db-password").await.expect("read failed");
    println!("password: {password:?} (remote calls: {})", client.call_count());

    // Served from the cache
    let _ = cache.get_secret_string("db-password").await.expect("read failed");
    println!("cached read (remote calls: {})", client.call_count());

    // A binary secret read as a string is absent
    let as_string = cache.get_secret_string("tls-key").await.expect("read failed");
    let as_binary = cache.get_secret_binary("tls-key").await.expect("read failed");
    println!("tls-key as string: {as_string:?}, as binary: {as_binary:?}");

    // Explicit version
    let pinned = cache
        .get_secret_string_with("db-password", &VersionSelector::id("v1"))
        .await
        .expect("read failed");
    println!("pinned v1: {pinned:?}, cached secrets: {}", cache.len());
}
