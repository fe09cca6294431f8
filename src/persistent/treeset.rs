//! Persistent (immutable) tree set ordered by a stored comparator.
//!
//! This module provides [`PersistentTreeSet`], an immutable ordered set
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentTreeSet` is implemented as a wrapper around
//! `PersistentTreeMap<T, (), C>`. Elements are kept in the order defined by
//! the set's comparator, and elements that compare equal are the same
//! element.
//!
//! - O(log N) contains
//! - O(log N) insert
//! - O(log N) remove
//! - O(N) len, folds, filter, partition
//! - O(1) `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use orderly::persistent::PersistentTreeSet;
//!
//! let set = PersistentTreeSet::new()
//!     .insert(3)
//!     .insert(1)
//!     .insert(2);
//!
//! assert!(set.contains(&1));
//! assert_eq!(set.to_vec(), vec![1, 2, 3]);
//!
//! // Structural sharing: the original set is preserved
//! let updated = set.insert(4);
//! assert_eq!(set.len(), 3);
//! assert_eq!(updated.len(), 4);
//! ```
//!
//! # Set Operations
//!
//! ```rust
//! use orderly::persistent::PersistentTreeSet;
//!
//! let set1: PersistentTreeSet<i32> = [1, 2, 3].into_iter().collect();
//! let set2: PersistentTreeSet<i32> = [2, 3, 4].into_iter().collect();
//!
//! assert_eq!(set1.union(&set2).to_vec(), vec![1, 2, 3, 4]);
//! assert_eq!(set1.intersection(&set2).to_vec(), vec![2, 3]);
//! assert_eq!(set1.difference(&set2).to_vec(), vec![1]);
//! ```

use super::treemap::{PersistentTreeMap, PersistentTreeMapIterator};
use crate::comparator::{Comparator, NaturalOrder};
use std::fmt;

// =============================================================================
// PersistentTreeSet Definition
// =============================================================================

/// A persistent (immutable) ordered set based on a Red-Black Tree.
///
/// Elements are ordered by the comparator `C`, which defaults to
/// [`NaturalOrder`].
///
/// # Time Complexity
///
/// | Operation      | Complexity   |
/// |----------------|--------------|
/// | `new`          | O(1)         |
/// | `contains`     | O(log N)     |
/// | `insert`       | O(log N)     |
/// | `remove`       | O(log N)     |
/// | `min`/`max`    | O(log N)     |
/// | `len`          | O(N)         |
/// | `is_empty`     | O(1)         |
/// | `union`        | O(M log N)   |
/// | `intersection` | O(N log M)   |
/// | `difference`   | O(M log N)   |
///
/// # Examples
///
/// ```rust
/// use orderly::persistent::PersistentTreeSet;
///
/// let descending = |left: &i32, right: &i32| right.cmp(left);
/// let set = PersistentTreeSet::from_iter_by(descending, [1, 3, 2, 3]);
///
/// assert_eq!(set.len(), 3);
/// assert_eq!(set.to_vec(), vec![3, 2, 1]);
/// ```
pub struct PersistentTreeSet<T, C = NaturalOrder> {
    /// Internal map with unit values
    inner: PersistentTreeMap<T, (), C>,
}

impl<T, C> Clone for PersistentTreeSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PersistentTreeSet<T> {
    /// Creates a new empty set ordered by the elements' [`Ord`] instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: PersistentTreeMap::new(),
        }
    }

    /// Creates a set containing a single element, ordered by the elements'
    /// [`Ord`] instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set = PersistentTreeSet::singleton(42);
    /// assert_eq!(set.len(), 1);
    /// assert!(set.contains(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self
    where
        T: Clone + Ord,
    {
        Self {
            inner: PersistentTreeMap::singleton(element, ()),
        }
    }
}

impl<T, C> PersistentTreeSet<T, C> {
    /// Returns the comparator that orders this set.
    #[inline]
    #[must_use]
    pub fn comparator(&self) -> &C {
        self.inner.comparator()
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns `true` if both sets share the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Returns the smallest element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [5, 2, 8].into_iter().collect();
    /// assert_eq!(set.min(), Some(&2));
    /// assert_eq!(set.max(), Some(&8));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<&T> {
        self.inner.min().map(|(element, _)| element)
    }

    /// Returns the largest element.
    #[must_use]
    pub fn max(&self) -> Option<&T> {
        self.inner.max().map(|(element, _)| element)
    }

    /// Returns an iterator over elements in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<char> = "hello".chars().collect();
    /// let letters: String = set.iter().collect();
    /// assert_eq!(letters, "ehlo");
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentTreeSetIterator<'_, T> {
        PersistentTreeSetIterator {
            inner: self.inner.iter(),
        }
    }

    /// Folds over the elements from the smallest to the largest.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [1, 2, 3].into_iter().collect();
    /// let digits = set.fold_left(0, |number, digit| number * 10 + digit);
    /// assert_eq!(digits, 123);
    /// ```
    pub fn fold_left<B, F>(&self, init: B, mut function: F) -> B
    where
        F: FnMut(B, &T) -> B,
    {
        self.inner
            .fold_left(init, |accumulator, element, _| function(accumulator, element))
    }

    /// Folds over the elements from the largest to the smallest.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [1, 2, 3].into_iter().collect();
    /// let digits = set.fold_right(0, |digit, number| number * 10 + digit);
    /// assert_eq!(digits, 321);
    /// ```
    pub fn fold_right<B, F>(&self, init: B, mut function: F) -> B
    where
        F: FnMut(&T, B) -> B,
    {
        self.inner
            .fold_right(init, |element, _, accumulator| function(element, accumulator))
    }
}

impl<T, C: Comparator<T>> PersistentTreeSet<T, C> {
    /// Creates a new empty set ordered by `comparator`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let by_length = |left: &String, right: &String| left.len().cmp(&right.len());
    /// let set = PersistentTreeSet::new_by(by_length)
    ///     .insert("three".to_string())
    ///     .insert("one".to_string());
    ///
    /// assert_eq!(set.min(), Some(&"one".to_string()));
    /// ```
    #[inline]
    #[must_use]
    pub fn new_by(comparator: C) -> Self {
        Self {
            inner: PersistentTreeMap::new_by(comparator),
        }
    }

    /// Returns `true` if the set contains an element equal to `element`
    /// under the set's comparator.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains(&self, element: &T) -> bool {
        self.inner.contains_key(element)
    }

    /// Returns the stored element that compares equal to `element`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let by_first_letter = |left: &&str, right: &&str| left[..1].cmp(&right[..1]);
    /// let set = PersistentTreeSet::new_by(by_first_letter).insert("apple");
    ///
    /// assert_eq!(set.get(&"avocado"), Some(&"apple"));
    /// ```
    #[must_use]
    pub fn get(&self, element: &T) -> Option<&T> {
        self.inner.get_key_value(element).map(|(stored, _)| stored)
    }

    /// Returns `true` if every element of `self` is contained in `other`.
    ///
    /// Membership is decided by `other`'s comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let small: PersistentTreeSet<i32> = [1, 2].into_iter().collect();
    /// let large: PersistentTreeSet<i32> = [1, 2, 3].into_iter().collect();
    ///
    /// assert!(small.is_subset(&large));
    /// assert!(!large.is_subset(&small));
    /// ```
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.iter().all(|element| other.contains(element))
    }

    /// Verifies the balancing and ordering invariants of the underlying tree.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        self.inner.check_invariants()
    }
}

impl<T: Clone, C: Comparator<T>> PersistentTreeSet<T, C> {
    /// Creates a set containing a single element, ordered by `comparator`.
    #[must_use]
    pub fn singleton_by(comparator: C, element: T) -> Self {
        Self {
            inner: PersistentTreeMap::singleton_by(comparator, element, ()),
        }
    }

    /// Builds a set ordered by `comparator` from a sequence of elements.
    ///
    /// When several elements compare equal, the first one is kept.
    #[must_use]
    pub fn from_iter_by<I>(comparator: C, elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            inner: PersistentTreeMap::from_iter_by(
                comparator,
                elements.into_iter().map(|element| (element, ())),
            ),
        }
    }

    /// Inserts an element into the set.
    ///
    /// If an equal element is already present, the set is returned
    /// unchanged in content and the stored element is kept.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set1 = PersistentTreeSet::new().insert(1);
    /// let set2 = set1.insert(2);
    ///
    /// assert_eq!(set1.len(), 1); // Original unchanged
    /// assert_eq!(set2.len(), 2); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        Self {
            inner: self.inner.insert(element, ()),
        }
    }

    /// Removes an element from the set.
    ///
    /// If the element is absent, the returned set shares the original tree.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [1, 2, 3].into_iter().collect();
    /// let removed = set.remove(&2);
    ///
    /// assert_eq!(removed.to_vec(), vec![1, 3]);
    /// assert!(set.remove(&9).ptr_eq(&set));
    /// ```
    #[must_use]
    pub fn remove(&self, element: &T) -> Self {
        Self {
            inner: self.inner.remove(element),
        }
    }

    /// Returns the elements in ascending order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.fold_right(Vec::new(), |element, mut elements| {
            elements.push(element.clone());
            elements
        })
        .into_iter()
        .rev()
        .collect()
    }

    /// Builds a new set from the transformed elements, ordered by
    /// `comparator`.
    ///
    /// Transformed elements that compare equal collapse into one; the
    /// first in ascending source order is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::comparator::NaturalOrder;
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [-2, -1, 0, 1, 2].into_iter().collect();
    /// let squares = set.map(NaturalOrder, |element| element * element);
    ///
    /// assert_eq!(squares.to_vec(), vec![0, 1, 4]);
    /// ```
    #[must_use]
    pub fn map<U, D, F>(&self, comparator: D, mut transform: F) -> PersistentTreeSet<U, D>
    where
        U: Clone,
        D: Comparator<U>,
        F: FnMut(&T) -> U,
    {
        self.fold_left(PersistentTreeSet::new_by(comparator), |mapped, element| {
            mapped.insert(transform(element))
        })
    }

    /// Keeps only elements for which the predicate returns true.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = (1..=6).collect();
    /// assert_eq!(set.filter(|n| n % 3 == 0).to_vec(), vec![3, 6]);
    /// ```
    #[must_use]
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        Self {
            inner: self.inner.filter(|element, _| predicate(element)),
        }
    }

    /// Splits the set into the elements satisfying the predicate and the rest.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::persistent::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = (1..=5).collect();
    /// let (even, odd) = set.partition(|n| n % 2 == 0);
    ///
    /// assert_eq!(even.to_vec(), vec![2, 4]);
    /// assert_eq!(odd.to_vec(), vec![1, 3, 5]);
    /// ```
    #[must_use]
    pub fn partition<P>(&self, mut predicate: P) -> (Self, Self)
    where
        P: FnMut(&T) -> bool,
    {
        let (matching, not_matching) = self.inner.partition(|element, _| predicate(element));
        (Self { inner: matching }, Self { inner: not_matching })
    }

    /// Returns the union of two sets, ordered by `self`'s comparator.
    ///
    /// When both sets hold equal elements, the element of `self` is kept.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            inner: self.inner.union(&other.inner),
        }
    }

    /// Returns the elements of `self` that are also in `other`.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            inner: self.inner.intersection(&other.inner),
        }
    }

    /// Returns the elements of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            inner: self.inner.difference(&other.inner),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over elements of a [`PersistentTreeSet`].
pub struct PersistentTreeSetIterator<'a, T> {
    inner: PersistentTreeMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for PersistentTreeSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, _)| element)
    }
}

impl<T> std::iter::FusedIterator for PersistentTreeSetIterator<'_, T> {}

/// An owning iterator over elements of a [`PersistentTreeSet`].
pub struct PersistentTreeSetIntoIterator<T> {
    elements: std::vec::IntoIter<T>,
}

impl<T> Iterator for PersistentTreeSetIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<T> DoubleEndedIterator for PersistentTreeSetIntoIterator<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.elements.next_back()
    }
}

impl<T> ExactSizeIterator for PersistentTreeSetIntoIterator<T> {
    fn len(&self) -> usize {
        self.elements.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T, C: Comparator<T> + Default> Default for PersistentTreeSet<T, C> {
    #[inline]
    fn default() -> Self {
        Self::new_by(C::default())
    }
}

impl<T: Clone, C: Comparator<T> + Default> FromIterator<T> for PersistentTreeSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_by(C::default(), iter)
    }
}

impl<T: Clone, C: Comparator<T>> Extend<T> for PersistentTreeSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            *self = self.insert(element);
        }
    }
}

impl<T: Clone, C: Comparator<T>> IntoIterator for PersistentTreeSet<T, C> {
    type Item = T;
    type IntoIter = PersistentTreeSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentTreeSetIntoIterator {
            elements: self.to_vec().into_iter(),
        }
    }
}

impl<'a, T, C> IntoIterator for &'a PersistentTreeSet<T, C> {
    type Item = &'a T;
    type IntoIter = PersistentTreeSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sets are equal when they hold the same number of elements and,
/// pairwise in ascending order, elements compare equal under `self`'s
/// comparator.
impl<T, C: Comparator<T>> PartialEq for PersistentTreeSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T, C: Comparator<T>> Eq for PersistentTreeSet<T, C> {}

impl<T: fmt::Debug, C> fmt::Debug for PersistentTreeSet<T, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display, C> fmt::Display for PersistentTreeSet<T, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for element in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Thread Safety
// =============================================================================

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentTreeSet<String>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentTreeSet<String>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
