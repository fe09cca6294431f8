//! Integration tests for thread-safe persistent ordered collections.
//!
//! These tests verify that `PersistentTreeMap` and `PersistentTreeSet` work
//! correctly with the `arc` feature enabled, sharing immutable trees and
//! their comparators across threads.

#![cfg(feature = "arc")]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use orderly::comparator::{NaturalOrder, Reversed};
use orderly::persistent::{PersistentTreeMap, PersistentTreeSet};
use rstest::rstest;
use std::sync::Arc;
use std::thread;

// =============================================================================
// PersistentTreeMap Integration Tests
// =============================================================================

#[rstest]
fn test_treemap_cross_thread_structural_sharing() {
    let original = Arc::new(
        PersistentTreeMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string())
            .insert(3, "three".to_string()),
    );

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let map_clone = Arc::clone(&original);
            thread::spawn(move || {
                let key = 10 + index;
                let extended = map_clone.insert(key, format!("value_{index}"));
                assert_eq!(extended.len(), 4);
                assert_eq!(map_clone.len(), 3);
                assert!(extended.check_invariants().is_ok());
                extended
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    for (index, map) in results.iter().enumerate() {
        let key = 10 + index as i32;
        assert_eq!(map.get(&key), Some(&format!("value_{index}")));
    }
    assert_eq!(original.len(), 3);
}

#[rstest]
fn test_treemap_custom_comparator_across_threads() {
    let descending = PersistentTreeMap::from_iter_by(
        Reversed(NaturalOrder),
        (0..100).map(|key| (key, key * 2)),
    );

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let map = descending.clone();
            thread::spawn(move || {
                let trimmed = (0..25).fold(map, |map, offset| map.remove(&(index * 25 + offset)));
                assert!(trimmed.check_invariants().is_ok());
                trimmed.keys().copied().collect::<Vec<i32>>()
            })
        })
        .collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let keys = handle.join().expect("Thread panicked");
        let removed = (index as i32 * 25)..(index as i32 * 25 + 25);
        assert_eq!(keys.len(), 75);
        assert!(keys.windows(2).all(|pair| pair[0] > pair[1]));
        assert!(keys.iter().all(|key| !removed.contains(key)));
    }
    assert_eq!(descending.len(), 100);
}

// =============================================================================
// PersistentTreeSet Integration Tests
// =============================================================================

#[rstest]
fn test_treeset_concurrent_reads() {
    let set: PersistentTreeSet<i32> = (0..1000).collect();
    let shared = Arc::new(set);

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let set = Arc::clone(&shared);
            thread::spawn(move || {
                (index * 100..(index + 1) * 100)
                    .filter(|element| set.contains(element))
                    .count()
            })
        })
        .collect();

    let found: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .sum();
    assert_eq!(found, 800);
}

#[rstest]
fn test_treeset_combined_after_threads() {
    let handles: Vec<_> = (0..4)
        .map(|index| {
            thread::spawn(move || {
                (0..50).fold(PersistentTreeSet::new(), |set, offset| {
                    set.insert(index * 50 + offset)
                })
            })
        })
        .collect();

    let combined = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .fold(PersistentTreeSet::new(), |combined, part| combined.union(&part));

    assert_eq!(combined.len(), 200);
    assert_eq!(combined.min(), Some(&0));
    assert_eq!(combined.max(), Some(&199));
    assert!(combined.check_invariants().is_ok());
}
