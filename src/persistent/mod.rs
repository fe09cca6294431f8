//! Persistent (immutable) ordered data structures.
//!
//! This module provides immutable ordered containers that use structural
//! sharing to minimize copying:
//!
//! - [`PersistentTreeMap`]: Persistent ordered map (Red-Black Tree)
//! - [`PersistentTreeSet`]: Persistent ordered set (based on [`PersistentTreeMap`])
//!
//! Both are parameterized by a [`Comparator`](crate::comparator::Comparator),
//! which defaults to [`NaturalOrder`](crate::comparator::NaturalOrder).
//!
//! # Structural Sharing
//!
//! All data structures in this module use structural sharing to ensure
//! that operations like inserting or removing create new versions without
//! copying the entire structure.
//!
//! # Examples
//!
//! ## `PersistentTreeMap`
//!
//! ```rust
//! use orderly::persistent::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert(1, "ONE");
//! assert_eq!(map.get(&1), Some(&"one"));  // Original unchanged
//! assert_eq!(updated.get(&1), Some(&"ONE")); // New version
//! ```
//!
//! ## `PersistentTreeSet`
//!
//! ```rust
//! use orderly::persistent::PersistentTreeSet;
//!
//! let by_length = |left: &&str, right: &&str| left.len().cmp(&right.len());
//! let set = PersistentTreeSet::new_by(by_length)
//!     .insert("ccc")
//!     .insert("a")
//!     .insert("zz");
//!
//! assert_eq!(set.to_vec(), vec!["a", "zz", "ccc"]);
//! // "bb" has the same length as "zz", so the comparator treats it as present
//! assert!(set.contains(&"bb"));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod red_black_tree;
mod treemap;
mod treeset;

pub use treemap::PersistentTreeMap;
pub use treemap::PersistentTreeMapIntoIterator;
pub use treemap::PersistentTreeMapIterator;
pub use treemap::PersistentTreeMapRangeIterator;
pub use treeset::PersistentTreeSet;
pub use treeset::PersistentTreeSetIntoIterator;
pub use treeset::PersistentTreeSetIterator;
