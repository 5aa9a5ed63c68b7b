// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Forced refresh: pick up a rotated secret without waiting for expiry.
//! Each forced refresh pauses for a few seconds first, so it cannot flood the service.

use secret_cache::SecretCache;
use secret_cache_client::testing::MockSecretsClient;
use tick::Clock;

#[tokio::main]
async fn main() {
    let clock = Clock::new_tokio();
    let client = MockSecretsClient::new();
    client.set_current_string("api-key", "v1", "first");

    let cache = SecretCache::new(client.clone(), clock.clone());

    let key = cache.get_secret_string("api-key").await.expect("read failed");
    println!("before rotation: {key:?}");

    // Rotate remotely; the cached metadata still points at v1
    client.set_current_string("api-key", "v2", "second");
    let key = cache.get_secret_string("api-key").await.expect("read failed");
    println!("after rotation, still cached: {key:?}");

    let started = clock.instant();
    let refreshed = cache.refresh_now("api-key").await.expect("refresh failed");
    println!("refreshed: {refreshed} after {:?}", clock.instant().saturating_duration_since(started));

    let key = cache.get_secret_string("api-key").await.expect("read failed");
    println!("after refresh: {key:?} (remote calls: {})", client.call_count());
}
