//! Bitset Tests - set algebra and membership contract
//!
//! Critical invariants tested:
//! - Exact cardinality at all times
//! - Inclusion-exclusion: |A∧B| + |A∨B| == |A| + |B|
//! - Padding bits never leak into counts or complements
//! - Failed calls have no effect

use popsim_core::{Bitset, BitsetError};
use proptest::prelude::*;

// ============================================================================
// Contract Tests
// ============================================================================

#[test]
fn test_create_variants() {
    let clear = Bitset::new(1000).unwrap();
    assert_eq!(clear.count(), 0);
    assert!(clear.is_empty());

    let set = Bitset::full(1000).unwrap();
    assert_eq!(set.count(), 1000);
}

#[test]
fn test_invalid_size() {
    assert_eq!(Bitset::new(0), Err(BitsetError::InvalidSize { size: 0 }));
}

#[test]
fn test_out_of_range_has_no_effect() {
    let mut bs = Bitset::from_indices(50, &[10]).unwrap();
    let before = bs.clone();
    assert!(bs.set(50).is_err());
    assert!(bs.clear(50).is_err());
    assert_eq!(bs, before);
}

#[test]
fn test_mismatched_sizes_fail() {
    let a = Bitset::full(64).unwrap();
    let b = Bitset::full(65).unwrap();
    assert_eq!(
        a.or(&b),
        Err(BitsetError::SizeMismatch { left: 64, right: 65 })
    );
    let mut c = a.clone();
    assert!(c.difference_with(&b).is_err());
    assert_eq!(c, a, "failed difference must leave operand unchanged");
}

#[test]
fn test_to_vector_ascending_and_rederivable() {
    let bs = Bitset::from_indices(300, &[250, 3, 64, 3, 128]).unwrap();
    assert_eq!(bs.to_vector(), vec![3, 64, 128, 250]);
    // Re-derivable: a second call produces the same sequence
    assert_eq!(bs.to_vector(), bs.to_vector());
}

#[test]
fn test_boolean_algebra_across_word_boundaries() {
    let a = Bitset::from_indices(130, &[0, 63, 64, 129]).unwrap();
    let b = Bitset::from_indices(130, &[63, 64, 100]).unwrap();

    assert_eq!(a.and(&b).unwrap().to_vector(), vec![63, 64]);
    assert_eq!(a.or(&b).unwrap().to_vector(), vec![0, 63, 64, 100, 129]);
    assert_eq!(a.not().count(), 126);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_inclusion_exclusion(
        (size, a_idx, b_idx) in (1usize..400).prop_flat_map(|size| {
            let idx = prop::collection::vec(0..size, 0..=size);
            (Just(size), idx.clone(), idx)
        })
    ) {
        let a = Bitset::from_indices(size, &a_idx).unwrap();
        let b = Bitset::from_indices(size, &b_idx).unwrap();
        prop_assert_eq!(
            a.and(&b).unwrap().count() + a.or(&b).unwrap().count(),
            a.count() + b.count()
        );
    }

    #[test]
    fn prop_complement_count(
        (size, idx) in (1usize..400).prop_flat_map(|size| {
            (Just(size), prop::collection::vec(0..size, 0..=size))
        })
    ) {
        let a = Bitset::from_indices(size, &idx).unwrap();
        prop_assert_eq!(a.not().count(), size - a.count());
        prop_assert!(a.and(&a.not()).unwrap().is_empty());
    }

    #[test]
    fn prop_to_vector_roundtrip(
        (size, idx) in (1usize..400).prop_flat_map(|size| {
            (Just(size), prop::collection::vec(0..size, 0..=size))
        })
    ) {
        let a = Bitset::from_indices(size, &idx).unwrap();
        let b = Bitset::from_indices(size, &a.to_vector()).unwrap();
        prop_assert_eq!(a, b);
    }
}
