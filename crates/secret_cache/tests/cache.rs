// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for reads, expiry, backoff, eviction and forced refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use secret_cache::{CacheHook, CachedItem, Error, ErrorKind, SecretCache, SecretValue, StoredItem, VersionSelector};
use secret_cache_client::testing::{ClientOp, MockSecretsClient};
use tick::{Clock, ClockControl};

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn cache_with(client: &MockSecretsClient, control: &ClockControl, ttl: Duration) -> SecretCache<MockSecretsClient> {
    SecretCache::builder(client.clone(), control.to_clock())
        .cache_item_ttl(ttl)
        .build()
        .unwrap()
}

#[test]
fn second_read_is_served_from_cache() -> TestResult {
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), Clock::new_frozen());

    block_on(async {
        assert_eq!(cache.get_secret_string("db").await?.as_deref(), Some("one"));
        assert_eq!(cache.get_secret_string("db").await?.as_deref(), Some("one"));
        Ok::<_, Error>(())
    })?;

    assert_eq!(client.describe_count("db"), 1);
    assert_eq!(client.get_value_count("db"), 1);
    Ok(())
}

#[test]
fn metadata_expires_between_half_and_full_ttl() -> TestResult {
    let control = ClockControl::new();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = cache_with(&client, &control, Duration::from_millis(1000));

    block_on(cache.get_secret_string("db"))?;

    control.advance(Duration::from_millis(499));
    block_on(cache.get_secret_string("db"))?;
    assert_eq!(client.describe_count("db"), 1);

    control.advance(Duration::from_millis(502));
    block_on(cache.get_secret_string("db"))?;
    assert_eq!(client.describe_count("db"), 2);

    // The version payload itself is not fetched again.
    assert_eq!(client.get_value_count("db"), 1);
    Ok(())
}

#[test]
fn rotated_secret_is_picked_up_after_expiry() -> TestResult {
    let control = ClockControl::new();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = cache_with(&client, &control, Duration::from_millis(1000));

    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    assert_eq!(client.call_count(), 2);

    // Metadata never expires before half its time to live.
    control.advance(Duration::from_millis(500));
    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    assert_eq!(client.call_count(), 2);

    control.advance(Duration::from_millis(100));
    client.set_current_string("db", "v2", "two");
    control.advance(Duration::from_millis(500));

    // Expired metadata is described again, then the newly staged version is fetched.
    client.clear_operations();
    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("two"));
    assert_eq!(
        client.operations(),
        vec![
            ClientOp::DescribeSecret("db".to_string()),
            ClientOp::GetSecretValue {
                secret_id: "db".to_string(),
                version_id: "v2".to_string(),
            },
        ]
    );
    assert_eq!(cache.cached_secret("db").version_count(), 2);
    Ok(())
}

#[test]
fn failure_is_cached_until_backoff_elapses() {
    let control = ClockControl::new();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    client.fail_next(Error::service("throttled"));
    let cache = cache_with(&client, &control, Duration::from_secs(3600));

    let error = block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Service);

    // The first backoff lasts between one and two seconds.
    control.advance(Duration::from_millis(999));
    let cached = block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(cached.kind(), ErrorKind::Service);
    assert_eq!(client.describe_count("db"), 1);

    control.advance(Duration::from_millis(1001));
    assert_eq!(block_on(cache.get_secret_string("db")).unwrap().as_deref(), Some("one"));
    assert_eq!(client.describe_count("db"), 2);
}

#[test]
fn backoff_window_grows_with_consecutive_failures() {
    let control = ClockControl::new();
    let client = MockSecretsClient::new();
    client.fail_when(|_| true);
    let cache = cache_with(&client, &control, Duration::from_secs(3600));

    block_on(cache.get_secret_string("db")).unwrap_err();
    control.advance(Duration::from_secs(2));
    block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(client.describe_count("db"), 2);

    // The second failure waits at least two seconds.
    control.advance(Duration::from_millis(1999));
    block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(client.describe_count("db"), 2);

    control.advance(Duration::from_millis(1001));
    block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(client.describe_count("db"), 3);
    assert_eq!(cache.cached_secret("db").failure_count(), 3);
}

#[test]
fn last_good_value_is_served_while_service_fails() -> TestResult {
    let control = ClockControl::new();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = cache_with(&client, &control, Duration::from_millis(1000));

    block_on(cache.get_secret_string("db"))?;

    client.fail_when(|_| true);
    control.advance(Duration::from_secs(5));

    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    assert_eq!(client.describe_count("db"), 2);
    assert!(cache.cached_secret("db").last_error().is_some());
    Ok(())
}

#[test]
fn unexpected_errors_are_not_cached() -> TestResult {
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    client.fail_next(Error::other("malformed response"));
    let cache = SecretCache::new(client.clone(), Clock::new_frozen());

    let error = block_on(cache.get_secret_string("db")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Other);
    assert_eq!(cache.cached_secret("db").failure_count(), 0);

    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    assert_eq!(client.describe_count("db"), 2);
    Ok(())
}

#[test]
fn mismatched_payload_type_is_absent() -> TestResult {
    let client = MockSecretsClient::new();
    client.set_current_string("text", "v1", "one");
    client.set_current_binary("blob", "v1", vec![1_u8, 2, 3]);
    let cache = SecretCache::new(client, Clock::new_frozen());

    block_on(async {
        assert_eq!(cache.get_secret_binary("text").await?, None);
        assert_eq!(cache.get_secret_string("blob").await?, None);
        assert_eq!(cache.get_secret_binary("blob").await?, Some(vec![1_u8, 2, 3]));
        Ok(())
    })
}

#[test]
fn unknown_stage_is_absent() -> TestResult {
    let client = MockSecretsClient::new();
    client.insert_version("db", SecretValue::from_string("v1", "one"), ["AWSPENDING"]);
    let cache = SecretCache::new(client.clone(), Clock::new_frozen());

    assert_eq!(block_on(cache.get_secret_string("db"))?, None);
    assert_eq!(client.get_value_count("db"), 0);
    Ok(())
}

#[test]
fn versions_can_be_selected_by_stage_or_id() -> TestResult {
    let client = MockSecretsClient::new();
    client.insert_version("db", SecretValue::from_string("v1", "old"), ["AWSPREVIOUS"]);
    client.set_current_string("db", "v2", "new");
    let cache = SecretCache::new(client, Clock::new_frozen());

    block_on(async {
        let previous = VersionSelector::stage("AWSPREVIOUS");
        assert_eq!(cache.get_secret_string_with("db", &previous).await?.as_deref(), Some("old"));
        assert_eq!(cache.get_secret_string("db").await?.as_deref(), Some("new"));

        let by_id = cache.get_secret_value_with("db", &VersionSelector::id("v1")).await?.unwrap();
        assert_eq!(by_id.version_id(), Some("v1"));
        assert_eq!(by_id.version_stages(), ["AWSPREVIOUS".to_string()]);
        Ok(())
    })
}

#[test]
fn configured_stage_is_the_default() -> TestResult {
    let client = MockSecretsClient::new();
    client.insert_version("db", SecretValue::from_string("v3", "pending"), ["AWSPENDING"]);
    client.set_current_string("db", "v2", "current");
    let cache = SecretCache::builder(client, Clock::new_frozen())
        .version_stage("AWSPENDING")
        .build()
        .unwrap();

    let value = block_on(cache.get_secret_value("db"))?.unwrap();
    assert_eq!(value.secret_string(), Some("pending"));
    Ok(())
}

#[test]
fn least_recently_used_secret_is_evicted() -> TestResult {
    let client = MockSecretsClient::new();
    for id in ["a", "b", "c"] {
        client.set_current_string(id, "v1", id);
    }
    let cache = SecretCache::builder(client.clone(), Clock::new_frozen())
        .max_cache_size(2)
        .build()
        .unwrap();

    block_on(async {
        cache.get_secret_string("a").await?;
        cache.get_secret_string("b").await?;
        cache.get_secret_string("a").await?;
        cache.get_secret_string("c").await?;
        Ok::<_, Error>(())
    })?;

    assert_eq!(cache.len(), 2);

    // "a" survived, "b" was evicted and must be fetched again.
    block_on(cache.get_secret_string("a"))?;
    block_on(cache.get_secret_string("b"))?;
    assert_eq!(client.describe_count("a"), 1);
    assert_eq!(client.describe_count("b"), 2);
    assert_eq!(cache.len(), 2);
    Ok(())
}

#[test]
fn single_slot_cache_keeps_latest_secret() -> TestResult {
    let client = MockSecretsClient::new();
    client.set_current_string("a", "v1", "one");
    client.set_current_string("b", "v1", "two");
    let cache = SecretCache::builder(client, Clock::new_frozen()).max_cache_size(1).build().unwrap();

    assert_eq!(block_on(cache.get_secret_string("a"))?.as_deref(), Some("one"));
    assert_eq!(block_on(cache.get_secret_string("b"))?.as_deref(), Some("two"));
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[test]
fn clear_drops_everything() -> TestResult {
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), Clock::new_frozen());

    block_on(cache.get_secret_string("db"))?;
    cache.clear();
    assert!(cache.is_empty());

    block_on(cache.get_secret_string("db"))?;
    assert_eq!(client.describe_count("db"), 2);
    Ok(())
}

#[test]
fn refresh_now_picks_up_rotation() -> TestResult {
    let control = ClockControl::new().auto_advance_timers(true);
    let clock = control.to_clock();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), clock.clone());

    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    client.set_current_string("db", "v2", "two");

    let start = clock.instant();
    assert!(block_on(cache.refresh_now("db"))?);

    // The refresh is paced by 3.5 to 4.5 seconds.
    let paused = clock.instant().duration_since(start);
    assert!(paused >= Duration::from_millis(3500) && paused < Duration::from_millis(4500), "{paused:?}");

    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("two"));
    Ok(())
}

#[test]
fn refresh_now_refetches_cached_versions() -> TestResult {
    let control = ClockControl::new().auto_advance_timers(true);
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), control.to_clock());

    block_on(cache.get_secret_string("db"))?;
    assert!(block_on(cache.refresh_now("db"))?);
    block_on(cache.get_secret_string("db"))?;

    assert_eq!(client.describe_count("db"), 2);
    assert_eq!(client.get_value_count("db"), 2);
    Ok(())
}

#[test]
fn failed_refresh_now_reports_false_and_keeps_value() -> TestResult {
    let control = ClockControl::new().auto_advance_timers(true);
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), control.to_clock());

    block_on(cache.get_secret_string("db"))?;

    client.fail_next(Error::service("unavailable"));
    assert!(!block_on(cache.refresh_now("db"))?);
    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    Ok(())
}

#[test]
fn refresh_now_on_unknown_secret_creates_entry() -> TestResult {
    let control = ClockControl::new().auto_advance_timers(true);
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client, control.to_clock());

    assert!(block_on(cache.refresh_now("db"))?);
    assert_eq!(cache.len(), 1);
    assert!(cache.cached_secret("db").has_result());
    Ok(())
}

#[test]
fn dropped_read_leaves_cache_untouched() -> TestResult {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let client = MockSecretsClient::new().with_latency(clock.clone(), Duration::from_millis(100));
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), clock.clone());

    // The read is abandoned while the describe call is in flight.
    assert!(cache.get_secret_string("db").now_or_never().is_none());

    let entry = cache.cached_secret("db");
    assert!(!entry.has_result());
    assert!(entry.last_error().is_none());
    assert!(entry.is_refresh_needed());

    let _ = client.clone().with_latency(clock, Duration::ZERO);
    assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    assert_eq!(client.describe_count("db"), 2);
    Ok(())
}

#[test]
fn concurrent_readers_share_one_fetch() {
    let control = ClockControl::new().auto_advance_timers(true);
    let clock = control.to_clock();
    let client = MockSecretsClient::new().with_latency(clock.clone(), Duration::from_millis(50));
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::new(client.clone(), clock);

    let results = block_on(futures::future::join_all((0..10).map(|_| cache.get_secret_string("db"))));

    for result in results {
        assert_eq!(result.unwrap().as_deref(), Some("one"));
    }
    assert_eq!(client.describe_count("db"), 1);
    assert_eq!(client.get_value_count("db"), 1);
}

#[derive(Debug, Clone, Default)]
struct CountingHook {
    puts: Arc<AtomicUsize>,
    gets: Arc<AtomicUsize>,
}

impl CacheHook for CountingHook {
    fn put(&self, item: CachedItem) -> Result<StoredItem, Error> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(item))
    }

    fn get(&self, stored: &StoredItem) -> Result<CachedItem, Error> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        stored
            .downcast_ref::<CachedItem>()
            .cloned()
            .ok_or_else(|| Error::other("unexpected stored item"))
    }
}

#[test]
fn hook_sees_every_store_and_read() -> TestResult {
    let hook = CountingHook::default();
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    client.set_current_string("api", "v1", "two");
    let cache = SecretCache::builder(client, Clock::new_frozen())
        .hook(hook.clone())
        .build()
        .unwrap();

    for _ in 0..10 {
        assert_eq!(block_on(cache.get_secret_string("db"))?.as_deref(), Some("one"));
    }

    // One store each for the metadata and the version; two reads per call.
    assert_eq!(hook.puts.load(Ordering::Relaxed), 2);
    assert_eq!(hook.gets.load(Ordering::Relaxed), 20);

    block_on(cache.get_secret_string("api"))?;
    assert_eq!(hook.puts.load(Ordering::Relaxed), 4);
    Ok(())
}

#[derive(Debug)]
struct RejectingHook;

impl CacheHook for RejectingHook {
    fn put(&self, _item: CachedItem) -> Result<StoredItem, Error> {
        Err(Error::service("vault sealed"))
    }

    fn get(&self, _stored: &StoredItem) -> Result<CachedItem, Error> {
        Err(Error::other("nothing stored"))
    }
}

#[test]
fn hook_failures_are_returned_and_not_cached() {
    let client = MockSecretsClient::new();
    client.set_current_string("db", "v1", "one");
    let cache = SecretCache::builder(client.clone(), Clock::new_frozen())
        .hook(RejectingHook)
        .build()
        .unwrap();

    block_on(cache.get_secret_string("db")).unwrap_err();
    block_on(cache.get_secret_string("db")).unwrap_err();

    // Nothing was cached, so every read goes to the service.
    assert_eq!(client.describe_count("db"), 2);
    let entry = cache.cached_secret("db");
    assert_eq!(entry.failure_count(), 0);
    assert!(!entry.has_result());
}
