//! Property-based tests for PersistentTreeSet.
//!
//! These tests verify that PersistentTreeSet behaves like a mathematical
//! set under its comparator, using proptest.

use orderly::persistent::PersistentTreeSet;
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// Strategies for Generating Test Data
// =============================================================================

fn arbitrary_elements(max_size: usize) -> impl Strategy<Value = Vec<i16>> {
    prop::collection::vec(-100_i16..100, 0..max_size)
}

/// Orders strings by length only, so strings of equal length collide.
fn by_length(left: &String, right: &String) -> std::cmp::Ordering {
    left.len().cmp(&right.len())
}

// =============================================================================
// Membership Laws
// =============================================================================

proptest! {
    /// Law: an inserted element is contained.
    #[test]
    fn prop_contains_after_insert(elements in arbitrary_elements(60), element: i16) {
        let set: PersistentTreeSet<i16> = elements.into_iter().collect();
        prop_assert!(set.insert(element).contains(&element));
    }

    /// Law: a removed element is not contained, and the result stays balanced.
    #[test]
    fn prop_not_contains_after_remove(elements in arbitrary_elements(60), element in -100_i16..100) {
        let set: PersistentTreeSet<i16> = elements.into_iter().collect();
        let removed = set.remove(&element);
        prop_assert!(!removed.contains(&element));
        prop_assert_eq!(removed.check_invariants(), Ok(()));
    }

    /// Law: to_vec yields the distinct elements in ascending order.
    #[test]
    fn prop_to_vec_sorted_distinct(elements in arbitrary_elements(100)) {
        let set: PersistentTreeSet<i16> = elements.iter().copied().collect();
        let expected: Vec<i16> = elements.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        prop_assert_eq!(set.to_vec(), expected);
    }

    /// Law: the number of elements equals the number of comparator classes.
    #[test]
    fn prop_len_counts_equivalence_classes(words in prop::collection::vec("[a-z]{0,6}", 0..40)) {
        let set = PersistentTreeSet::from_iter_by(by_length as fn(&String, &String) -> std::cmp::Ordering, words.clone());
        let lengths: BTreeSet<usize> = words.iter().map(String::len).collect();
        prop_assert_eq!(set.len(), lengths.len());
    }
}

// =============================================================================
// Algebra Laws
// =============================================================================

proptest! {
    /// Law: union agrees with the reference implementation.
    #[test]
    fn prop_union_matches_model(left in arbitrary_elements(50), right in arbitrary_elements(50)) {
        let left_set: PersistentTreeSet<i16> = left.iter().copied().collect();
        let right_set: PersistentTreeSet<i16> = right.iter().copied().collect();
        let left_model: BTreeSet<i16> = left.into_iter().collect();
        let right_model: BTreeSet<i16> = right.into_iter().collect();

        let union = left_set.union(&right_set);
        prop_assert_eq!(union.check_invariants(), Ok(()));
        prop_assert_eq!(union.to_vec(), left_model.union(&right_model).copied().collect::<Vec<_>>());
    }

    /// Law: intersection and difference agree with the reference implementation.
    #[test]
    fn prop_intersection_difference_match_model(
        left in arbitrary_elements(50),
        right in arbitrary_elements(50)
    ) {
        let left_set: PersistentTreeSet<i16> = left.iter().copied().collect();
        let right_set: PersistentTreeSet<i16> = right.iter().copied().collect();
        let left_model: BTreeSet<i16> = left.into_iter().collect();
        let right_model: BTreeSet<i16> = right.into_iter().collect();

        prop_assert_eq!(
            left_set.intersection(&right_set).to_vec(),
            left_model.intersection(&right_model).copied().collect::<Vec<_>>()
        );
        prop_assert_eq!(
            left_set.difference(&right_set).to_vec(),
            left_model.difference(&right_model).copied().collect::<Vec<_>>()
        );
    }

    /// Law: partition splits the set into a predicate-true and a predicate-false part.
    #[test]
    fn prop_partition_splits(elements in arbitrary_elements(80), pivot in -100_i16..100) {
        let set: PersistentTreeSet<i16> = elements.into_iter().collect();
        let (low, high) = set.partition(|element| *element <= pivot);

        prop_assert!(low.iter().all(|element| *element <= pivot));
        prop_assert!(high.iter().all(|element| *element > pivot));
        prop_assert!(low.is_subset(&set));
        prop_assert!(high.is_subset(&set));
        prop_assert_eq!(low.union(&high), set);
    }
}
