//! Fixed-size bit vector over entity indices
//!
//! The `Bitset` is the engine's membership primitive: every categorical
//! variable, event target, and sampled subset is a bitset over the
//! population `[0, N)`. Size is fixed at construction.
//!
//! # Critical Invariants
//!
//! 1. **Fixed size**: `size` never changes after construction
//! 2. **Padding**: unused high bits of the final word are always zero;
//!    every mutator preserves this (so `count()` is a plain popcount)
//! 3. All size/index violations are reported synchronously, and a failed
//!    call leaves the bitset unchanged

mod sample;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::rng::RngManager;

/// Bits per storage word
const WORD_BITS: usize = 64;

/// Errors that can occur during bitset operations
#[derive(Debug, Error, PartialEq)]
pub enum BitsetError {
    #[error("Invalid bitset size: {size} (must be nonzero)")]
    InvalidSize { size: usize },

    #[error("Index out of range: {index} (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Bitset size mismatch: {left} vs {right}")]
    SizeMismatch { left: usize, right: usize },

    #[error("Invalid sampling rate: {rate} (must be in [0, 1])")]
    InvalidRate { rate: f64 },
}

/// Fixed-size bit vector indicating membership of entities in `[0, N)`
///
/// # Example
/// ```
/// use popsim_core::Bitset;
///
/// let mut bs = Bitset::new(100).unwrap();
/// bs.set(3).unwrap();
/// bs.set(97).unwrap();
/// assert_eq!(bs.count(), 2);
/// assert_eq!(bs.to_vector(), vec![3, 97]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitset {
    /// Number of addressable bits (entity count)
    num_bits: usize,

    /// Packed storage, little-endian bit order within each word
    words: Vec<u64>,
}

impl Bitset {
    /// Create an all-clear bitset of the given size
    pub fn new(size: usize) -> Result<Self, BitsetError> {
        if size == 0 {
            return Err(BitsetError::InvalidSize { size });
        }
        let num_words = size.div_ceil(WORD_BITS);
        Ok(Self {
            num_bits: size,
            words: vec![0u64; num_words],
        })
    }

    /// All-clear bitset where the caller already holds a nonzero size
    ///
    /// Internal shortcut for paths whose size invariant was validated at
    /// construction time (e.g. a variable's population size).
    pub(crate) fn new_unchecked(size: usize) -> Self {
        debug_assert!(size > 0);
        Self {
            num_bits: size,
            words: vec![0u64; size.div_ceil(WORD_BITS)],
        }
    }

    /// Create an all-set bitset of the given size
    pub fn full(size: usize) -> Result<Self, BitsetError> {
        let mut bs = Self::new(size)?;
        bs.insert_all();
        Ok(bs)
    }

    /// Create a bitset from an explicit list of indices
    pub fn from_indices(size: usize, indices: &[usize]) -> Result<Self, BitsetError> {
        let mut bs = Self::new(size)?;
        for &i in indices {
            bs.set(i)?;
        }
        Ok(bs)
    }

    /// Number of addressable bits
    pub fn size(&self) -> usize {
        self.num_bits
    }

    /// True when no bit is set
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Mask covering the valid bits of the final word
    fn last_word_mask(&self) -> u64 {
        let used = self.num_bits % WORD_BITS;
        if used == 0 {
            u64::MAX
        } else {
            (1u64 << used) - 1
        }
    }

    fn check_index(&self, index: usize) -> Result<(), BitsetError> {
        if index >= self.num_bits {
            return Err(BitsetError::IndexOutOfRange {
                index,
                size: self.num_bits,
            });
        }
        Ok(())
    }

    fn check_size(&self, other: &Bitset) -> Result<(), BitsetError> {
        if self.num_bits != other.num_bits {
            return Err(BitsetError::SizeMismatch {
                left: self.num_bits,
                right: other.num_bits,
            });
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn assert_padding(&self) {
        if let Some(&last) = self.words.last() {
            debug_assert_eq!(
                last & !self.last_word_mask(),
                0,
                "padding bits set in final word"
            );
        }
    }

    #[cfg(not(debug_assertions))]
    fn assert_padding(&self) {}

    /// Set bit `index`
    pub fn set(&mut self, index: usize) -> Result<(), BitsetError> {
        self.check_index(index)?;
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
        Ok(())
    }

    /// Clear bit `index`
    pub fn clear(&mut self, index: usize) -> Result<(), BitsetError> {
        self.check_index(index)?;
        self.words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
        Ok(())
    }

    /// Query bit `index`
    pub fn get(&self, index: usize) -> Result<bool, BitsetError> {
        self.check_index(index)?;
        Ok(self.words[index / WORD_BITS] >> (index % WORD_BITS) & 1 == 1)
    }

    /// Set every bit
    pub fn insert_all(&mut self) {
        for w in &mut self.words {
            *w = u64::MAX;
        }
        let mask = self.last_word_mask();
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
        self.assert_padding();
    }

    /// Clear every bit
    pub fn clear_all(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    /// Exact number of set bits
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Ascending vector of set indices
    pub fn to_vector(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Iterator over set indices in ascending order
    pub fn iter(&self) -> SetBits<'_> {
        SetBits {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// In-place union: `self |= other`
    pub fn union_with(&mut self, other: &Bitset) -> Result<(), BitsetError> {
        self.check_size(other)?;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
        self.assert_padding();
        Ok(())
    }

    /// In-place intersection: `self &= other`
    pub fn intersect_with(&mut self, other: &Bitset) -> Result<(), BitsetError> {
        self.check_size(other)?;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= b;
        }
        Ok(())
    }

    /// In-place difference: `self &= !other`
    pub fn difference_with(&mut self, other: &Bitset) -> Result<(), BitsetError> {
        self.check_size(other)?;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !b;
        }
        Ok(())
    }

    /// New bitset: `self & other`
    pub fn and(&self, other: &Bitset) -> Result<Bitset, BitsetError> {
        let mut out = self.clone();
        out.intersect_with(other)?;
        Ok(out)
    }

    /// New bitset: `self | other`
    pub fn or(&self, other: &Bitset) -> Result<Bitset, BitsetError> {
        let mut out = self.clone();
        out.union_with(other)?;
        Ok(out)
    }

    /// New bitset: complement of `self` over `[0, size)`
    pub fn not(&self) -> Bitset {
        let mut out = self.clone();
        for w in &mut out.words {
            *w = !*w;
        }
        let mask = out.last_word_mask();
        if let Some(last) = out.words.last_mut() {
            *last &= mask;
        }
        out.assert_padding();
        out
    }

    /// Retain exactly `k` uniformly chosen set bits, clearing the rest
    ///
    /// Fails with `IndexOutOfRange` if `k` exceeds the number of set bits.
    /// Uses Floyd's algorithm to draw `k` distinct ranks without building
    /// the full rank vector.
    pub fn choose(&mut self, k: usize, rng: &mut RngManager) -> Result<(), BitsetError> {
        let total = self.count();
        if k > total {
            return Err(BitsetError::IndexOutOfRange {
                index: k,
                size: total,
            });
        }
        if k == total {
            return Ok(());
        }

        let mut chosen: BTreeSet<usize> = BTreeSet::new();
        for j in (total - k)..total {
            let t = rng.range(0, j as u64 + 1) as usize;
            if !chosen.insert(t) {
                chosen.insert(j);
            }
        }

        // Single forward pass mapping sorted ranks to bit positions
        let mut out = Bitset::new(self.num_bits)?;
        let mut rank_iter = chosen.into_iter();
        let mut next_rank = rank_iter.next();
        for (rank, pos) in self.iter().enumerate() {
            match next_rank {
                Some(r) if r == rank => {
                    out.words[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
                    next_rank = rank_iter.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        *self = out;
        Ok(())
    }
}

/// Iterator over the set bits of a [`Bitset`], ascending
pub struct SetBits<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_idx];
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(self.word_idx * WORD_BITS + bit)
    }
}

/// Position (0..64) of the `k`-th set bit of `word` (k zero-based)
///
/// Caller guarantees `k < word.count_ones()`.
pub(crate) fn select_in_word(mut word: u64, k: u32) -> usize {
    for _ in 0..k {
        word &= word - 1;
    }
    word.trailing_zeros() as usize
}
