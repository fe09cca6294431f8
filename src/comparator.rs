//! Total-order functions used to arrange keys.
//!
//! Every ordered container in this crate is parameterized by a
//! [`Comparator`] instead of relying on the key type's [`Ord`] instance.
//! This lets callers index arbitrary types, including structured records,
//! under any total order they choose.
//!
//! Any closure or function of type `Fn(&K, &K) -> Ordering` is a comparator:
//!
//! ```rust
//! use orderly::comparator::Comparator;
//! use std::cmp::Ordering;
//!
//! let by_length = |left: &String, right: &String| left.len().cmp(&right.len());
//! assert_eq!(
//!     by_length.compare(&"ab".to_string(), &"xyz".to_string()),
//!     Ordering::Less
//! );
//! ```
//!
//! [`NaturalOrder`] delegates to [`Ord`], and [`Reversed`] flips any
//! comparator.

use std::cmp::Ordering;

// =============================================================================
// Comparator Trait
// =============================================================================

/// A total order over values of type `K`.
///
/// Implementations must be consistent: the relation must be reflexive,
/// antisymmetric and transitive, and must not change over the lifetime of
/// a container that stores it. Keys that compare [`Ordering::Equal`] are
/// treated as the same key.
pub trait Comparator<K: ?Sized> {
    /// Compares two keys.
    fn compare(&self, left: &K, right: &K) -> Ordering;
}

impl<K: ?Sized, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, left: &K, right: &K) -> Ordering {
        self(left, right)
    }
}

// =============================================================================
// NaturalOrder
// =============================================================================

/// The comparator that delegates to the key type's [`Ord`] instance.
///
/// This is the default comparator of
/// [`PersistentTreeMap`](crate::persistent::PersistentTreeMap) and
/// [`PersistentTreeSet`](crate::persistent::PersistentTreeSet).
///
/// # Examples
///
/// ```rust
/// use orderly::comparator::{Comparator, NaturalOrder};
/// use std::cmp::Ordering;
///
/// assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> Comparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

// =============================================================================
// Reversed
// =============================================================================

/// A comparator that inverts the order of the wrapped comparator.
///
/// # Examples
///
/// ```rust
/// use orderly::comparator::{Comparator, NaturalOrder, Reversed};
/// use std::cmp::Ordering;
///
/// let descending = Reversed(NaturalOrder);
/// assert_eq!(descending.compare(&1, &2), Ordering::Greater);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Reversed<C>(pub C);

impl<K: ?Sized, C: Comparator<K>> Comparator<K> for Reversed<C> {
    #[inline]
    fn compare(&self, left: &K, right: &K) -> Ordering {
        self.0.compare(right, left)
    }
}

/// Combinators available on every comparator.
pub trait ComparatorExt<K: ?Sized>: Comparator<K> + Sized {
    /// Returns a comparator with the opposite order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use orderly::comparator::{Comparator, ComparatorExt, NaturalOrder};
    /// use std::cmp::Ordering;
    ///
    /// let descending = ComparatorExt::<i32>::reversed(NaturalOrder);
    /// assert_eq!(descending.compare(&3, &1), Ordering::Less);
    /// ```
    fn reversed(self) -> Reversed<Self> {
        Reversed(self)
    }
}

impl<K: ?Sized, C: Comparator<K>> ComparatorExt<K> for C {}

// =============================================================================
// Tests
// =============================================================================
