//! Allocation reuse utilities.
//!
//! This module provides two building blocks for frame-based workloads that
//! rebuild the same structures every frame:
//!
//! - [`Poolable`] - values that can be cleared in place, preserving their
//!   allocated capacity, so the next frame can refill them without
//!   reallocating.
//! - [`FreeLists`] - type-keyed free lists of reusable instances. Released
//!   instances are handed out again before anything new is created
//!   (reuse-first).
//!
//! # Example
//!
//! ```
//! use ufg_core::pool::{Acquired, FreeLists};
//!
//! let mut pool = FreeLists::<u32, Vec<u8>>::new();
//!
//! // Nothing released yet: the factory runs
//! let first = pool
//!     .acquire_or_create(&64, |size| Ok::<_, ()>(Vec::with_capacity(*size as usize)))
//!     .unwrap();
//! assert!(!first.is_reused());
//!
//! // Released instances are reused for the same key
//! pool.release(64, first.into_inner());
//! let second = pool
//!     .acquire_or_create(&64, |_| Err(()))
//!     .unwrap();
//! assert!(second.is_reused());
//! ```

use std::collections::HashMap;
use std::hash::Hash;

/// Trait for types that can be pooled and reused.
///
/// Implementors must be able to create an empty instance and clear their
/// contents while preserving allocated capacity.
pub trait Poolable {
    /// Create a new empty instance for pool initialization.
    fn new_empty() -> Self;

    /// Reset the value to an empty state, preserving allocated capacity.
    ///
    /// For example, call `Vec::clear()` rather than replacing with a new `Vec`.
    fn reset(&mut self);
}

/// Outcome of [`FreeLists::acquire_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired<V> {
    /// The value was taken from a free list.
    Reused(V),
    /// The free list was empty and the value was freshly created.
    Created(V),
}

impl<V> Acquired<V> {
    /// Check if the value came from a free list.
    pub fn is_reused(&self) -> bool {
        matches!(self, Self::Reused(_))
    }

    /// Unwrap the acquired value.
    pub fn into_inner(self) -> V {
        match self {
            Self::Reused(v) | Self::Created(v) => v,
        }
    }
}

/// Free lists of reusable values, partitioned by a type key.
///
/// Values released under a key can only be acquired again under an equal
/// key. Each list is LIFO, so the most recently released value is reused
/// first.
#[derive(Debug)]
pub struct FreeLists<K, V> {
    lists: HashMap<K, Vec<V>>,
}

impl<K, V> Default for FreeLists<K, V> {
    fn default() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> FreeLists<K, V> {
    /// Create empty free lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a released value for `key`, if any.
    pub fn acquire(&mut self, key: &K) -> Option<V> {
        self.lists.get_mut(key).and_then(Vec::pop)
    }

    /// Take a released value for `key`, or create one with `create`.
    ///
    /// The free list is always drained before `create` is called.
    pub fn acquire_or_create<E>(
        &mut self,
        key: &K,
        create: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<Acquired<V>, E> {
        match self.acquire(key) {
            Some(value) => Ok(Acquired::Reused(value)),
            None => create(key).map(Acquired::Created),
        }
    }

    /// Return a value to the free list of `key`.
    pub fn release(&mut self, key: K, value: V) {
        self.lists.entry(key).or_default().push(value);
    }

    /// Number of values available for `key`.
    pub fn available(&self, key: &K) -> usize {
        self.lists.get(key).map_or(0, Vec::len)
    }

    /// Total number of values across all keys.
    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Check if no value is available under any key.
    pub fn is_empty(&self) -> bool {
        self.lists.values().all(Vec::is_empty)
    }

    /// Remove and return every pooled value.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_
    where
        K: Clone,
    {
        self.lists
            .drain()
            .flat_map(|(key, values)| values.into_iter().map(move |v| (key.clone(), v)))
    }
}
