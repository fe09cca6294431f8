//! Persistent (immutable) tree map ordered by a stored comparator.
//!
//! This module provides [`PersistentTreeMap`], an immutable ordered map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentTreeMap` pairs a persistent Red-Black Tree with a
//! [`Comparator`]. The comparator is fixed at construction and reused,
//! unchanged, by every map derived from it.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) update
//! - O(N) len, folds, filter, partition
//! - O(1) `is_empty`
//!
//! All operations return new maps without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use orderly::persistent::PersistentTreeMap;
//!
//! #[derive(Clone, Debug)]
//! struct Version {
//!     major: u32,
//!     minor: u32,
//!     label: &'static str,
//! }
//!
//! // Order releases by version number, ignoring labels.
//! let by_number = |left: &Version, right: &Version| {
//!     (left.major, left.minor).cmp(&(right.major, right.minor))
//! };
//!
//! let releases = PersistentTreeMap::new_by(by_number)
//!     .insert(Version { major: 1, minor: 2, label: "stable" }, "2024-03")
//!     .insert(Version { major: 0, minor: 9, label: "beta" }, "2023-11");
//!
//! let lookup = Version { major: 1, minor: 2, label: "" };
//! assert_eq!(releases.get(&lookup), Some(&"2024-03"));
//! assert_eq!(releases.keys().next().map(|version| version.label), Some("beta"));
//! ```
//!
//! # Combining maps
//!
//! Binary operations (`union`, `intersection`, `difference`, `merge`,
//! `union_with`) keep the comparator of the receiver and discard the
//! comparator of the argument. Both maps must order keys equivalently;
//! this is not checked, and mismatched comparators yield results that are
//! consistent with neither.
//!
//! Both operands must also share the comparator *type* `C`. Every closure
//! literal has its own type, so two maps built from two separate closures
//! cannot be combined. Use a function pointer or a named comparator type
//! such as [`NaturalOrder`] or [`Reversed`](crate::comparator::Reversed)
//! when maps built in different places need to be combined:
//!
//! ```rust
//! use orderly::persistent::PersistentTreeMap;
//! use std::cmp::Ordering;
//!
//! type ByLength = fn(&String, &String) -> Ordering;
//!
//! fn by_length(left: &String, right: &String) -> Ordering {
//!     left.len().cmp(&right.len())
//! }
//!
//! let short = PersistentTreeMap::new_by(by_length as ByLength).insert("ab".to_string(), 1);
//!
//! // A non-capturing closure coerces to the same function pointer type.
//! let by_length_again: ByLength = |left, right| left.len().cmp(&right.len());
//! let long = PersistentTreeMap::new_by(by_length_again).insert("abcd".to_string(), 2);
//!
//! let combined = short.union(&long);
//! assert_eq!(combined.to_vec(), vec![("ab".to_string(), 1), ("abcd".to_string(), 2)]);
//! ```

use super::ReferenceCounter;
use super::red_black_tree::{InOrder, RedBlackTree};
use crate::comparator::{Comparator, NaturalOrder};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};

// =============================================================================
// PersistentTreeMap Definition
// =============================================================================

/// A persistent (immutable) ordered map based on Red-Black Tree.
///
/// `PersistentTreeMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// Keys are ordered by the comparator `C`, which defaults to
/// [`NaturalOrder`]. Keys that compare equal are the same key, even when
/// they differ in other respects.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `update`       | O(log N)          |
/// | `contains_key` | O(log N)          |
/// | `min`/`max`    | O(log N)          |
/// | `range`        | O(log N + k)      |
/// | `len`          | O(N)              |
/// | `is_empty`     | O(1)              |
/// | `merge`        | O(N + M)          |
///
/// # Examples
///
/// ```rust
/// use orderly::persistent::PersistentTreeMap;
///
/// let map = PersistentTreeMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// // Ordered iteration
/// let map = PersistentTreeMap::new()
///     .insert(3, "three")
///     .insert(1, "one")
///     .insert(2, "two");
///
/// let keys: Vec<&i32> = map.keys().collect();
/// assert_eq!(keys, vec![&1, &2, &3]);
/// ```
pub struct PersistentTreeMap<K, V, C = NaturalOrder> {
    /// Root of the balanced tree
    tree: RedBlackTree<K, V>,
    /// Order shared by this map and every map derived from it
    comparator: ReferenceCounter<C>,
}

impl<K, V, C> Clone for PersistentTreeMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            comparator: ReferenceCounter::clone(&self.comparator),
        }
    }
}

impl<K, V> PersistentTreeMap<K, V> {
    /// Creates a new empty map ordered by the keys' [`Ord`] instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RedBlackTree::new(),
            comparator: ReferenceCounter::new(NaturalOrder),
        }
    }

    /// Creates a map containing a single key-value pair, ordered by the
    /// keys' [`Ord`] instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(&42), Some(&"answer"));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self
    where
        K: Clone + Ord,
        V: Clone,
    {
        Self::singleton_by(NaturalOrder, key, value)
    }
}

impl<K, V, C> PersistentTreeMap<K, V, C> {
    /// Returns the comparator that orders this map.
    #[inline]
    #[must_use]
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Returns the number of entries in the map.
    ///
    /// The size is not cached; it is counted on every call.
    ///
    /// # Complexity
    ///
    /// O(N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let empty: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(empty.is_empty());
    ///
    /// let non_empty = empty.insert(1, "one".to_string());
    /// assert!(!non_empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` if both maps share the same tree.
    ///
    /// Operations that leave a map unchanged (removing an absent key,
    /// updating to an equal value) return a map for which this holds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(1, "one");
    /// assert!(map.remove(&2).ptr_eq(&map));
    /// assert!(!map.insert(2, "two").ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// assert_eq!(map.min(), Some((&1, &"one")));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        self.tree.min()
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// assert_eq!(map.max(), Some((&3, &"three")));
    /// ```
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        self.tree.max()
    }

    /// Returns an iterator over entries in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{}: {}", key, value);
    /// }
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentTreeMapIterator<'_, K, V> {
        PersistentTreeMapIterator {
            inner: self.tree.iter(),
        }
    }

    /// Returns an iterator over keys in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let keys: Vec<&i32> = map.keys().collect();
    /// assert_eq!(keys, vec![&1, &2, &3]);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 60);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Folds over the entries from the smallest key to the largest.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(2, "b")
    ///     .insert(1, "a");
    ///
    /// let joined = map.fold_left(String::new(), |mut joined, key, value| {
    ///     joined.push_str(&format!("{key}{value}"));
    ///     joined
    /// });
    /// assert_eq!(joined, "1a2b");
    /// ```
    pub fn fold_left<B, F>(&self, init: B, function: F) -> B
    where
        F: FnMut(B, &K, &V) -> B,
    {
        self.tree.fold_left(init, function)
    }

    /// Folds over the entries from the largest key to the smallest.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(2, "b")
    ///     .insert(1, "a");
    ///
    /// let joined = map.fold_right(String::new(), |key, value, mut joined| {
    ///     joined.push_str(&format!("{key}{value}"));
    ///     joined
    /// });
    /// assert_eq!(joined, "2b1a");
    /// ```
    pub fn fold_right<B, F>(&self, init: B, function: F) -> B
    where
        F: FnMut(&K, &V, B) -> B,
    {
        self.tree.fold_right(init, function)
    }

    /// Wraps a tree derived from this map with the same comparator.
    fn derive<W>(&self, tree: RedBlackTree<K, W>) -> PersistentTreeMap<K, W, C> {
        PersistentTreeMap {
            tree,
            comparator: ReferenceCounter::clone(&self.comparator),
        }
    }

    /// Records combinations whose operands were built with different
    /// comparator instances. The receiver's comparator is kept either way.
    fn trace_comparator_handoff<W>(&self, other: &PersistentTreeMap<K, W, C>, operation: &str) {
        if !ReferenceCounter::ptr_eq(&self.comparator, &other.comparator) {
            log::trace!(
                "{operation}: operands carry distinct comparator instances; keeping the receiver's"
            );
        }
    }
}

impl<K, V, C: Comparator<K>> PersistentTreeMap<K, V, C> {
    /// Creates a new empty map ordered by `comparator`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let descending = |left: &i32, right: &i32| right.cmp(left);
    /// let map = PersistentTreeMap::new_by(descending)
    ///     .insert(1, "one")
    ///     .insert(3, "three");
    ///
    /// let keys: Vec<&i32> = map.keys().collect();
    /// assert_eq!(keys, vec![&3, &1]);
    /// ```
    #[inline]
    #[must_use]
    pub fn new_by(comparator: C) -> Self {
        Self {
            tree: RedBlackTree::new(),
            comparator: ReferenceCounter::new(comparator),
        }
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to look up
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// assert_eq!(map.get(&"hello".to_string()), Some(&42));
    /// assert_eq!(map.get(&"world".to_string()), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.tree.get(self.comparator(), key)
    }

    /// Returns the stored key and its value for a key that compares equal
    /// to `key`.
    ///
    /// With a comparator that ignores part of the key, the stored key may
    /// differ from the one used for the lookup.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let case_insensitive =
    ///     |left: &String, right: &String| left.to_lowercase().cmp(&right.to_lowercase());
    /// let map = PersistentTreeMap::new_by(case_insensitive).insert("Rust".to_string(), 2015);
    ///
    /// assert_eq!(
    ///     map.get_key_value(&"RUST".to_string()),
    ///     Some((&"Rust".to_string(), &2015))
    /// );
    /// ```
    #[must_use]
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.tree.get_entry(self.comparator(), key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to check
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key(&"key".to_string()));
    /// assert!(!map.contains_key(&"other".to_string()));
    /// ```
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.contains_key(self.comparator(), key)
    }

    /// Walks both maps in ascending key order and folds every key into an
    /// accumulator through exactly one of three steps.
    ///
    /// - `left_step` receives keys found only in `self`
    /// - `both_step` receives keys found in both maps
    /// - `right_step` receives keys found only in `other`
    ///
    /// Keys are matched with `self`'s comparator; `other`'s is ignored.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let stock: PersistentTreeMap<&str, u32> =
    ///     [("apple", 3), ("pear", 1)].into_iter().collect();
    /// let prices: PersistentTreeMap<&str, f64> =
    ///     [("apple", 0.5), ("plum", 0.8)].into_iter().collect();
    ///
    /// let report = stock.merge(
    ///     &prices,
    ///     |fruit, _, mut report: Vec<String>| {
    ///         report.push(format!("{fruit}: unpriced"));
    ///         report
    ///     },
    ///     |fruit, count, price, mut report| {
    ///         report.push(format!("{fruit}: {:.2}", f64::from(*count) * price));
    ///         report
    ///     },
    ///     |fruit, _, mut report| {
    ///         report.push(format!("{fruit}: out of stock"));
    ///         report
    ///     },
    ///     Vec::new(),
    /// );
    ///
    /// assert_eq!(report, vec!["apple: 1.50", "pear: unpriced", "plum: out of stock"]);
    /// ```
    pub fn merge<W, R, LeftStep, BothStep, RightStep>(
        &self,
        other: &PersistentTreeMap<K, W, C>,
        left_step: LeftStep,
        both_step: BothStep,
        right_step: RightStep,
        init: R,
    ) -> R
    where
        LeftStep: FnMut(&K, &V, R) -> R,
        BothStep: FnMut(&K, &V, &W, R) -> R,
        RightStep: FnMut(&K, &W, R) -> R,
    {
        self.trace_comparator_handoff(other, "merge");
        self.tree.merge(
            self.comparator(),
            &other.tree,
            left_step,
            both_step,
            right_step,
            init,
        )
    }

    /// Verifies the balancing and ordering invariants of the underlying tree.
    ///
    /// Intended for tests; returns a description of the first violation.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        self.tree.check_invariants(self.comparator()).map(|_| ())
    }
}

impl<K: Clone, V: Clone, C: Comparator<K>> PersistentTreeMap<K, V, C> {
    /// Creates a map containing a single key-value pair, ordered by `comparator`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::comparator::{NaturalOrder, Reversed};
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::singleton_by(Reversed(NaturalOrder), 1, "one");
    /// assert_eq!(map.get(&1), Some(&"one"));
    /// ```
    #[must_use]
    pub fn singleton_by(comparator: C, key: K, value: V) -> Self {
        Self::new_by(comparator).insert(key, value)
    }

    /// Builds a map ordered by `comparator` from a sequence of entries.
    ///
    /// Entries are inserted in sequence order, so a later duplicate key
    /// overwrites the value of an earlier one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let by_absolute_value = |left: &i32, right: &i32| left.abs().cmp(&right.abs());
    /// let map = PersistentTreeMap::from_iter_by(by_absolute_value, [(-2, "a"), (1, "b"), (2, "c")]);
    ///
    /// assert_eq!(map.to_vec(), vec![(1, "b"), (-2, "c")]);
    /// ```
    #[must_use]
    pub fn from_iter_by<I>(comparator: C, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let tree = RedBlackTree::from_iter_by(&comparator, entries);
        Self {
            tree,
            comparator: ReferenceCounter::new(comparator),
        }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains an equal key, the value is replaced and
    /// the stored key is kept.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert
    /// * `value` - The value to insert
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.derive(self.tree.insert(self.comparator(), key, value))
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key doesn't exist,
    /// returns a map sharing the original tree.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to remove
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        self.derive(self.tree.remove(self.comparator(), key))
    }

    /// Updates the value stored under `key` with a function of the
    /// current value.
    ///
    /// `updater` receives `Some(current)` when the key is present and `None`
    /// otherwise. Returning `Some(value)` stores `value`; returning `None`
    /// removes the key. When nothing changes the returned map shares the
    /// original tree.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let counts = PersistentTreeMap::new().insert("apple", 1);
    /// let increment = |count: Option<&u32>| Some(count.map_or(1, |count| count + 1));
    ///
    /// let counts = counts.update("apple", increment).update("pear", increment);
    /// assert_eq!(counts.get(&"apple"), Some(&2));
    /// assert_eq!(counts.get(&"pear"), Some(&1));
    ///
    /// let without_pear = counts.update("pear", |_| None);
    /// assert!(!without_pear.contains_key(&"pear"));
    /// ```
    #[must_use]
    pub fn update<F>(&self, key: K, updater: F) -> Self
    where
        F: FnOnce(Option<&V>) -> Option<V>,
        V: PartialEq,
    {
        self.derive(self.tree.update(self.comparator(), key, updater))
    }

    /// Applies a function to all values, keeping keys unchanged.
    ///
    /// The result has exactly the shape of the original tree, so no
    /// rebalancing takes place. The function is applied in ascending key
    /// order.
    ///
    /// # Complexity
    ///
    /// O(N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20);
    /// let described = map.map_values(|key, value| format!("{key}={value}"));
    /// assert_eq!(described.get(&2), Some(&"2=20".to_string()));
    /// ```
    #[must_use]
    pub fn map_values<W, F>(&self, transform: F) -> PersistentTreeMap<K, W, C>
    where
        F: FnMut(&K, &V) -> W,
    {
        self.derive(self.tree.map_values(transform))
    }

    /// Keeps only entries for which the predicate returns true.
    ///
    /// # Arguments
    ///
    /// * `predicate` - A function that receives a reference to the key and value,
    ///   and returns true if the entry should be kept
    ///
    /// # Complexity
    ///
    /// O(N log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30);
    /// let even_keys = map.filter(|k, _| k % 2 == 0);
    /// assert_eq!(even_keys.len(), 1);
    /// assert_eq!(even_keys.get(&2), Some(&20));
    /// ```
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.derive(self.tree.filter(self.comparator(), predicate))
    }

    /// Applies a function to each entry, keeping only those that return Some.
    ///
    /// # Complexity
    ///
    /// O(N log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "1".to_string())
    ///     .insert(2, "abc".to_string())
    ///     .insert(3, "42".to_string());
    /// let parsed = map.filter_map(|_, v| v.parse::<i32>().ok());
    /// assert_eq!(parsed.len(), 2);
    /// assert_eq!(parsed.get(&3), Some(&42));
    /// ```
    #[must_use]
    pub fn filter_map<W, F>(&self, mut filter_transform: F) -> PersistentTreeMap<K, W, C>
    where
        W: Clone,
        F: FnMut(&K, &V) -> Option<W>,
    {
        let comparator = self.comparator();
        let tree = self.fold_left(RedBlackTree::<K, W>::new(), |kept, key, value| {
            match filter_transform(key, value) {
                Some(new_value) => kept.insert(comparator, key.clone(), new_value),
                None => kept,
            }
        });
        self.derive(tree)
    }

    /// Partitions the map into two maps based on a predicate.
    ///
    /// Returns a tuple of two maps:
    /// - The first contains entries for which the predicate returns true
    /// - The second contains entries for which the predicate returns false
    ///
    /// # Complexity
    ///
    /// O(N log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30)
    ///     .insert(4, 40);
    /// let (even_keys, odd_keys) = map.partition(|k, _| k % 2 == 0);
    /// assert_eq!(even_keys.len(), 2);
    /// assert_eq!(odd_keys.len(), 2);
    /// ```
    #[must_use]
    pub fn partition<P>(&self, predicate: P) -> (Self, Self)
    where
        P: FnMut(&K, &V) -> bool,
    {
        let (matching, not_matching) = self.tree.partition(self.comparator(), predicate);
        (self.derive(matching), self.derive(not_matching))
    }

    /// Returns the union of two maps; on a shared key the value of `self` wins.
    ///
    /// The result is ordered by `self`'s comparator.
    ///
    /// # Complexity
    ///
    /// O(M log(N + M))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let map2 = PersistentTreeMap::new()
    ///     .insert(2, "TWO")
    ///     .insert(3, "three");
    /// let merged = map1.union(&map2);
    /// assert_eq!(merged.get(&1), Some(&"one"));
    /// assert_eq!(merged.get(&2), Some(&"two")); // From map1
    /// assert_eq!(merged.get(&3), Some(&"three"));
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.trace_comparator_handoff(other, "union");
        self.derive(self.tree.union(self.comparator(), &other.tree))
    }

    /// Returns the union of two maps, resolving shared keys with `resolver`.
    ///
    /// `resolver` receives the key, the value from `self` and the value
    /// from `other`.
    ///
    /// # Complexity
    ///
    /// O((N + M) log(N + M))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new()
    ///     .insert(1, 100)
    ///     .insert(2, 200);
    /// let map2 = PersistentTreeMap::new()
    ///     .insert(2, 50)
    ///     .insert(3, 300);
    /// let merged = map1.union_with(&map2, |_, v1, v2| v1 + v2);
    /// assert_eq!(merged.get(&2), Some(&250));
    /// assert_eq!(merged.get(&3), Some(&300));
    /// ```
    #[must_use]
    pub fn union_with<F>(&self, other: &Self, mut resolver: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let comparator = self.comparator();
        let tree = self.merge(
            other,
            |key, value, merged: RedBlackTree<K, V>| {
                merged.insert(comparator, key.clone(), value.clone())
            },
            |key, value, other_value, merged| {
                merged.insert(comparator, key.clone(), resolver(key, value, other_value))
            },
            |key, other_value, merged| merged.insert(comparator, key.clone(), other_value.clone()),
            RedBlackTree::new(),
        );
        self.derive(tree)
    }

    /// Keeps the entries of `self` whose keys are also present in `other`.
    ///
    /// # Complexity
    ///
    /// O(N (log M + log N))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map1: PersistentTreeMap<i32, &str> = [(1, "a"), (2, "b")].into_iter().collect();
    /// let map2: PersistentTreeMap<i32, &str> = [(2, "x"), (3, "y")].into_iter().collect();
    /// assert_eq!(map1.intersection(&map2).to_vec(), vec![(2, "b")]);
    /// ```
    #[must_use]
    pub fn intersection<W>(&self, other: &PersistentTreeMap<K, W, C>) -> Self {
        self.trace_comparator_handoff(other, "intersection");
        self.derive(self.tree.intersection(self.comparator(), &other.tree))
    }

    /// Removes from `self` every key present in `other`.
    ///
    /// # Complexity
    ///
    /// O(M log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map1: PersistentTreeMap<i32, &str> = [(1, "a"), (2, "b")].into_iter().collect();
    /// let map2: PersistentTreeMap<i32, ()> = [(2, ())].into_iter().collect();
    /// assert_eq!(map1.difference(&map2).to_vec(), vec![(1, "a")]);
    /// ```
    #[must_use]
    pub fn difference<W>(&self, other: &PersistentTreeMap<K, W, C>) -> Self {
        self.trace_comparator_handoff(other, "difference");
        self.derive(self.tree.difference(self.comparator(), &other.tree))
    }

    /// Returns the entries in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(2, 'b').insert(1, 'a');
    /// assert_eq!(map.to_vec(), vec![(1, 'a'), (2, 'b')]);
    /// ```
    #[must_use]
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.tree.to_vec()
    }

    /// Returns an iterator over entries within the specified range.
    ///
    /// Bounds are interpreted with the map's comparator:
    /// - `a..b` - from a (inclusive) to b (exclusive)
    /// - `a..=b` - from a (inclusive) to b (inclusive)
    /// - `a..` - from a (inclusive) to the end
    /// - `..b` - from the start to b (exclusive)
    /// - `..` - all entries
    ///
    /// # Complexity
    ///
    /// O(log N + k) where k is the number of entries in the range
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two")
    ///     .insert(3, "three")
    ///     .insert(4, "four")
    ///     .insert(5, "five");
    ///
    /// let range: Vec<(&i32, &&str)> = map.range(2..=4).collect();
    /// assert_eq!(range.len(), 3); // 2, 3, 4
    /// ```
    pub fn range<R>(&self, range: R) -> PersistentTreeMapRangeIterator<'_, K, V, C>
    where
        R: RangeBounds<K>,
    {
        PersistentTreeMapRangeIterator {
            inner: self.tree.iter_from(self.comparator(), range.start_bound()),
            upper: range.end_bound().cloned(),
            comparator: self.comparator(),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentTreeMap`].
pub struct PersistentTreeMapIterator<'a, K, V> {
    inner: InOrder<'a, K, V>,
}

impl<'a, K, V> Iterator for PersistentTreeMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<K, V> std::iter::FusedIterator for PersistentTreeMapIterator<'_, K, V> {}

/// A range iterator over key-value pairs of a [`PersistentTreeMap`].
pub struct PersistentTreeMapRangeIterator<'a, K, V, C = NaturalOrder> {
    inner: InOrder<'a, K, V>,
    upper: Bound<K>,
    comparator: &'a C,
}

impl<'a, K, V, C: Comparator<K>> Iterator for PersistentTreeMapRangeIterator<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        let inside = match &self.upper {
            Bound::Included(bound) => self.comparator.compare(key, bound) != Ordering::Greater,
            Bound::Excluded(bound) => self.comparator.compare(key, bound) == Ordering::Less,
            Bound::Unbounded => true,
        };
        if inside {
            Some((key, value))
        } else {
            self.inner.clear();
            None
        }
    }
}

/// An owning iterator over key-value pairs of a [`PersistentTreeMap`].
pub struct PersistentTreeMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentTreeMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for PersistentTreeMapIntoIterator<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.entries.next_back()
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, C: Comparator<K> + Default> Default for PersistentTreeMap<K, V, C> {
    #[inline]
    fn default() -> Self {
        Self::new_by(C::default())
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Default> FromIterator<(K, V)>
    for PersistentTreeMap<K, V, C>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_iter_by(C::default(), iter)
    }
}

impl<K: Clone, V: Clone, C: Comparator<K>> Extend<(K, V)> for PersistentTreeMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            *self = self.insert(key, value);
        }
    }
}

impl<K: Clone, V: Clone, C: Comparator<K>> IntoIterator for PersistentTreeMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = PersistentTreeMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentTreeMapIntoIterator {
            entries: self.to_vec().into_iter(),
        }
    }
}

impl<'a, K, V, C> IntoIterator for &'a PersistentTreeMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentTreeMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Maps are equal when they hold the same number of entries and, pairwise in
/// ascending order, keys compare equal under `self`'s comparator and values
/// are equal.
impl<K, V: PartialEq, C: Comparator<K>> PartialEq for PersistentTreeMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        let mut left_entries = self.iter();
        let mut right_entries = other.iter();
        loop {
            match (left_entries.next(), right_entries.next()) {
                (None, None) => return true,
                (Some((left_key, left_value)), Some((right_key, right_value)))
                    if self.comparator.compare(left_key, right_key) == Ordering::Equal
                        && left_value == right_value => {}
                _ => return false,
            }
        }
    }
}

impl<K, V: Eq, C: Comparator<K>> Eq for PersistentTreeMap<K, V, C> {}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for PersistentTreeMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, C> fmt::Display for PersistentTreeMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Thread Safety
// =============================================================================

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentTreeMap<i32, String>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentTreeMap<i32, String>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::Reversed;
    use rstest::rstest;

    // =========================================================================
    // Display Tests
    // =========================================================================

    #[rstest]
    fn test_display_empty_treemap() {
        let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
        assert_eq!(format!("{map}"), "{}");
    }

    #[rstest]
    fn test_display_single_element_treemap() {
        let map = PersistentTreeMap::singleton(1, "one".to_string());
        assert_eq!(format!("{map}"), "{1: one}");
    }

    #[rstest]
    fn test_display_follows_comparator_order() {
        let map = PersistentTreeMap::new_by(Reversed(NaturalOrder))
            .insert(1, "one".to_string())
            .insert(3, "three".to_string())
            .insert(2, "two".to_string());
        assert_eq!(format!("{map}"), "{3: three, 2: two, 1: one}");
    }

    #[rstest]
    fn test_debug_formats_as_map() {
        let map = PersistentTreeMap::new().insert(2, 'b').insert(1, 'a');
        assert_eq!(format!("{map:?}"), "{1: 'a', 2: 'b'}");
    }

    // =========================================================================
    // Comparator Propagation Tests
    // =========================================================================

    #[rstest]
    fn test_derived_maps_share_the_comparator() {
        let map = PersistentTreeMap::new_by(Reversed(NaturalOrder)).insert(1, 1);
        let derived = map.insert(2, 2).remove(&1).filter(|_, _| true);
        assert!(ReferenceCounter::ptr_eq(&map.comparator, &derived.comparator));
    }

    #[rstest]
    fn test_union_keeps_receiver_comparator() {
        fn ascending(left: &i32, right: &i32) -> Ordering {
            left.cmp(right)
        }
        fn descending(left: &i32, right: &i32) -> Ordering {
            right.cmp(left)
        }
        let comparator: fn(&i32, &i32) -> Ordering = ascending;
        let other_comparator: fn(&i32, &i32) -> Ordering = descending;
        let left = PersistentTreeMap::from_iter_by(comparator, [(1, 'a'), (3, 'c')]);
        let right = PersistentTreeMap::from_iter_by(other_comparator, [(2, 'b')]);

        let merged = left.union(&right);

        assert!(ReferenceCounter::ptr_eq(&left.comparator, &merged.comparator));
        assert_eq!(merged.to_vec(), vec![(1, 'a'), (2, 'b'), (3, 'c')]);
    }

    // =========================================================================
    // Update Tests
    // =========================================================================

    #[rstest]
    fn test_update_without_change_shares_tree() {
        let map: PersistentTreeMap<i32, i32> = (0..8).map(|key| (key, key)).collect();
        assert!(map.update(3, |value| value.copied()).ptr_eq(&map));
        assert!(map.update(30, |_| None).ptr_eq(&map));
    }

    #[rstest]
    fn test_update_removes_present_key() {
        let map: PersistentTreeMap<i32, i32> = (0..8).map(|key| (key, key)).collect();
        let updated = map.update(3, |_| None);
        assert_eq!(updated.len(), 7);
        assert!(updated.check_invariants().is_ok());
    }

    // =========================================================================
    // Range Tests
    // =========================================================================

    #[rstest]
    fn test_range_with_reversed_comparator() {
        let map = PersistentTreeMap::from_iter_by(
            Reversed(NaturalOrder),
            (0..10).map(|key| (key, key * key)),
        );
        let keys: Vec<i32> = map.range(7..3).map(|(key, _)| *key).collect();
        assert_eq!(keys, vec![7, 6, 5, 4]);
    }

    #[rstest]
    fn test_range_exhausted_iterator_stays_exhausted() {
        let map: PersistentTreeMap<i32, ()> = (0..10).map(|key| (key, ())).collect();
        let mut range = map.range(..2);
        assert_eq!(range.next().map(|(key, _)| *key), Some(0));
        assert_eq!(range.next().map(|(key, _)| *key), Some(1));
        assert_eq!(range.next(), None);
        assert_eq!(range.next(), None);
    }

    // =========================================================================
    // Equality Tests
    // =========================================================================

    #[rstest]
    fn test_eq_ignores_insertion_order() {
        let map1 = PersistentTreeMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        let map2 = PersistentTreeMap::new()
            .insert(2, "two".to_string())
            .insert(1, "one".to_string());

        assert_eq!(map1, map2);
    }

    #[rstest]
    fn test_eq_uses_comparator_for_keys() {
        let case_insensitive =
            |left: &String, right: &String| left.to_lowercase().cmp(&right.to_lowercase());
        let map1 = PersistentTreeMap::new_by(case_insensitive).insert("Key".to_string(), 1);
        let map2 = map1.remove(&"key".to_string()).insert("KEY".to_string(), 1);

        assert_eq!(map1, map2);
    }

    #[rstest]
    fn test_ne_on_different_sizes() {
        let map1: PersistentTreeMap<i32, i32> = (0..3).map(|key| (key, key)).collect();
        let map2 = map1.remove(&2);
        assert_ne!(map1, map2);
        assert_ne!(map2, map1);
    }

    // =========================================================================
    // Conversion Tests
    // =========================================================================

    #[rstest]
    fn test_into_iter_yields_owned_entries_in_order() {
        let map: PersistentTreeMap<i32, String> =
            [(2, "b".to_string()), (1, "a".to_string())].into_iter().collect();
        let entries: Vec<(i32, String)> = map.into_iter().rev().collect();
        assert_eq!(entries, vec![(2, "b".to_string()), (1, "a".to_string())]);
    }

    #[rstest]
    fn test_extend_inserts_entries() {
        let mut map = PersistentTreeMap::new().insert(1, 'a');
        map.extend([(3, 'c'), (2, 'b')]);
        assert_eq!(map.to_vec(), vec![(1, 'a'), (2, 'b'), (3, 'c')]);
    }

    #[rstest]
    fn test_default_uses_natural_order() {
        let map: PersistentTreeMap<i32, i32> = PersistentTreeMap::default();
        let map = map.insert(2, 2).insert(1, 1);
        assert_eq!(map.min(), Some((&1, &1)));
    }
}
