// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A size-bounded map with least-recently-used trimming.

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

#[derive(Debug)]
struct Tracked<V> {
    value: V,
    last_used: u64,
}

/// Outcome of [`BoundedMap::get_or_insert_with`].
#[derive(Debug)]
pub(crate) struct Lookup<K, V> {
    pub value: V,
    pub evicted: Vec<(K, V)>,
}

/// A map holding at most `capacity` entries once an insert returns.
///
/// Every lookup and insert stamps the entry with a monotonically increasing
/// tick. Trimming only happens on insert: when the map grows past capacity,
/// the fraction `(len - capacity) / len` of its entries is removed, oldest
/// ticks first.
#[derive(Debug)]
pub(crate) struct BoundedMap<K, V> {
    capacity: usize,
    entries: HashMap<K, Tracked<V>>,
    tick: u64,
}

impl<K, V> BoundedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the value for `key` and marks it as recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let tick = self.next_tick();
        self.entries.get_mut(key).map(|tracked| {
            tracked.last_used = tick;
            tracked.value.clone()
        })
    }

    /// Returns the value for `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|tracked| tracked.value.clone())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|tracked| &tracked.value)
    }

    /// Returns the value for `key`, inserting the one made by `make` if absent.
    ///
    /// An insert that pushes the map past capacity trims it before returning.
    /// The fresh entry carries the newest tick, so it is never among the
    /// evicted ones.
    pub fn get_or_insert_with<Q>(&mut self, key: &Q, make: impl FnOnce() -> V) -> Lookup<K, V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(value) = self.get(key) {
            return Lookup {
                value,
                evicted: Vec::new(),
            };
        }

        let value = make();
        let last_used = self.next_tick();
        self.entries.insert(
            key.to_owned(),
            Tracked {
                value: value.clone(),
                last_used,
            },
        );

        Lookup {
            value,
            evicted: self.trim(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    fn trim(&mut self) -> Vec<(K, V)> {
        let len = self.entries.len();
        if len <= self.capacity {
            return Vec::new();
        }

        // The fraction (len - capacity) / len of len entries.
        let count = len - self.capacity;

        let mut by_age: Vec<(u64, K)> = self
            .entries
            .iter()
            .map(|(key, tracked)| (tracked.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);

        by_age
            .into_iter()
            .take(count)
            .filter_map(|(_, key)| self.entries.remove(&key).map(|tracked| (key, tracked.value)))
            .collect()
    }
}
