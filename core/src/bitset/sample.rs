//! Stochastic sampling over bitsets
//!
//! `sample(rate)` keeps each set bit independently with probability
//! `rate`. Three strategies implement the same Bernoulli process:
//!
//! 1. **Per-bit scan** (`sample_bernoulli`): one uniform draw per set
//!    bit. Correct baseline, O(set bits).
//! 2. **Skip-sampling** (`sample_skip`): for small rates, draw geometric
//!    skip distances over set-bit ranks and jump straight to the next
//!    retained bit. Rejected bits are never visited.
//! 3. **Word-level extraction** (`sample_words`): per 64-bit word, draw
//!    a binomial count from the word's popcount, then extract that many
//!    distinct set bits. One draw per word instead of one per bit at
//!    moderate rates.
//!
//! Strategies agree in distribution, not bit-for-bit: with the same RNG
//! stream they consume different numbers of draws and retain different
//! subsets. Tests compare aggregate statistics, never exact output.

use super::{select_in_word, Bitset, BitsetError, WORD_BITS};
use crate::rng::RngManager;

/// Below this rate `sample` switches to skip-sampling
///
/// Expected draws per retained bit make skip-sampling win when fewer
/// than about one bit in sixteen survives.
pub(crate) const SKIP_SAMPLING_RATE_CUTOFF: f64 = 1.0 / 16.0;

impl Bitset {
    /// Retain each set bit independently with probability `rate`
    ///
    /// Returns a new bitset of the same size. Fails with `InvalidRate`
    /// outside `[0, 1]`. The strategy is chosen by rate magnitude and is
    /// not part of the observable contract.
    ///
    /// # Example
    /// ```
    /// use popsim_core::{Bitset, RngManager};
    ///
    /// let mut rng = RngManager::new(42);
    /// let population = Bitset::full(10_000).unwrap();
    /// let infected = population.sample(0.1, &mut rng).unwrap();
    /// assert!(infected.count() < 10_000);
    /// ```
    pub fn sample(&self, rate: f64, rng: &mut RngManager) -> Result<Bitset, BitsetError> {
        self.check_rate(rate)?;
        if rate == 0.0 {
            return Bitset::new(self.num_bits);
        }
        if rate == 1.0 {
            return Ok(self.clone());
        }
        if rate < SKIP_SAMPLING_RATE_CUTOFF {
            self.sample_skip(rate, rng)
        } else {
            self.sample_words(rate, rng)
        }
    }

    fn check_rate(&self, rate: f64) -> Result<(), BitsetError> {
        if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
            return Err(BitsetError::InvalidRate { rate });
        }
        Ok(())
    }

    /// Baseline strategy: one Bernoulli trial per set bit
    pub fn sample_bernoulli(
        &self,
        rate: f64,
        rng: &mut RngManager,
    ) -> Result<Bitset, BitsetError> {
        self.check_rate(rate)?;
        let mut out = Bitset::new(self.num_bits)?;
        for pos in self.iter() {
            if rng.bernoulli(rate) {
                out.words[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
            }
        }
        Ok(out)
    }

    /// Skip-sampling strategy for small rates
    ///
    /// Draws the rank of each retained bit directly: successive gaps are
    /// geometric with parameter `rate`, which is exactly the gap law of
    /// a Bernoulli(`rate`) process. Ranks map to positions with a
    /// forward popcount cursor, so each word is inspected at most once.
    pub fn sample_skip(&self, rate: f64, rng: &mut RngManager) -> Result<Bitset, BitsetError> {
        self.check_rate(rate)?;
        let mut out = Bitset::new(self.num_bits)?;
        if rate == 0.0 {
            return Ok(out);
        }

        let total = self.count() as u64;
        let mut rank = rng.geometric(rate);
        let mut word_idx = 0usize;
        let mut count_before = 0u64;

        while rank < total {
            // Advance the cursor to the word holding the rank-th set bit
            loop {
                let in_word = self.words[word_idx].count_ones() as u64;
                if count_before + in_word > rank {
                    break;
                }
                count_before += in_word;
                word_idx += 1;
            }
            let within = (rank - count_before) as u32;
            let bit = select_in_word(self.words[word_idx], within);
            out.words[word_idx] |= 1u64 << bit;

            let gap = rng.geometric(rate);
            rank = match rank.checked_add(1).and_then(|r| r.checked_add(gap)) {
                Some(r) => r,
                None => break,
            };
        }
        Ok(out)
    }

    /// Word-level bulk extraction strategy
    ///
    /// For every storage word: draw how many of its set bits survive
    /// (binomial over the popcount), then pick that many distinct bits
    /// by partial Fisher-Yates over the bit ranks.
    pub fn sample_words(&self, rate: f64, rng: &mut RngManager) -> Result<Bitset, BitsetError> {
        self.check_rate(rate)?;
        let mut out = Bitset::new(self.num_bits)?;

        for (word_idx, &word) in self.words.iter().enumerate() {
            let c = word.count_ones();
            if c == 0 {
                continue;
            }
            let k = rng.binomial(c, rate);
            if k == 0 {
                continue;
            }
            if k == c {
                out.words[word_idx] = word;
                continue;
            }

            let mut ranks = [0u8; WORD_BITS];
            for (j, r) in ranks.iter_mut().enumerate().take(c as usize) {
                *r = j as u8;
            }
            for j in 0..k as usize {
                let swap_with = rng.range(j as u64, c as u64) as usize;
                ranks.swap(j, swap_with);
            }
            for &r in ranks.iter().take(k as usize) {
                out.words[word_idx] |= 1u64 << select_in_word(word, r as u32);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rate_rejected() {
        let mut rng = RngManager::new(1);
        let bs = Bitset::full(64).unwrap();
        for bad in [-0.1, 1.1, f64::NAN] {
            assert!(matches!(
                bs.sample(bad, &mut rng),
                Err(BitsetError::InvalidRate { .. })
            ));
        }
    }

    #[test]
    fn test_rate_zero_and_one() {
        let mut rng = RngManager::new(1);
        let bs = Bitset::from_indices(100, &[5, 50, 99]).unwrap();
        assert_eq!(bs.sample(0.0, &mut rng).unwrap().count(), 0);
        assert_eq!(bs.sample(1.0, &mut rng).unwrap(), bs);
    }

    #[test]
    fn test_sample_is_subset_of_input() {
        let mut rng = RngManager::new(7);
        let bs = Bitset::from_indices(300, &[1, 2, 3, 70, 140, 141, 250, 299]).unwrap();
        for strategy in 0..3 {
            let sampled = match strategy {
                0 => bs.sample_bernoulli(0.5, &mut rng).unwrap(),
                1 => bs.sample_skip(0.5, &mut rng).unwrap(),
                _ => bs.sample_words(0.5, &mut rng).unwrap(),
            };
            assert_eq!(sampled.size(), bs.size());
            assert_eq!(sampled.and(&bs).unwrap(), sampled, "sampled bits must come from the input");
        }
    }

    #[test]
    fn test_sample_empty_input() {
        let mut rng = RngManager::new(9);
        let bs = Bitset::new(128).unwrap();
        assert!(bs.sample(0.5, &mut rng).unwrap().is_empty());
        assert!(bs.sample_skip(0.01, &mut rng).unwrap().is_empty());
        assert!(bs.sample_words(0.9, &mut rng).unwrap().is_empty());
    }
}
