//! xorshift64* random number generator
//!
//! This is a fast, high-quality PRNG that is deterministic and suitable
//! for simulation purposes.
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers. This is CRITICAL for:
//! - Debugging (reproduce exact simulation)
//! - Testing (verify behavior)
//! - Checkpoint/restore (bit-exact resumption)

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use popsim_core::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let uniform = rng.next_f64(); // [0.0, 1.0)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is coerced to 1 (xorshift requires nonzero state).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        // Take the top 53 bits so the result is an exact dyadic in [0, 1)
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: u64, max: u64) -> u64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        min + value % (max - min)
    }

    /// Single Bernoulli trial with success probability `p`
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Number of failures before the first success in a Bernoulli(`p`) process
    ///
    /// Inverse-transform draw of a geometric variate. Used by skip-sampling
    /// to jump directly to the next retained bit: a skip of `k` means the
    /// next `k` candidates are rejected and the one after is retained.
    ///
    /// Requires `0 < p <= 1`.
    pub fn geometric(&mut self, p: f64) -> u64 {
        debug_assert!(p > 0.0 && p <= 1.0);
        if p >= 1.0 {
            return 0;
        }
        let u = self.next_f64();
        // ln(1 - u) is never -inf since next_f64() < 1.0
        let skip = ((1.0 - u).ln() / (1.0 - p).ln()).floor();
        // Clamp pathological float results; callers treat large skips as "past the end"
        if skip < 0.0 {
            0
        } else if skip >= u64::MAX as f64 {
            u64::MAX
        } else {
            skip as u64
        }
    }

    /// Binomial draw: number of successes in `n` Bernoulli(`p`) trials
    ///
    /// Inverse-transform over the pmf, intended for the word-level sampler
    /// where `n <= 64`. Cost is O(n) in the worst case, constant in practice.
    pub fn binomial(&mut self, n: u32, p: f64) -> u32 {
        debug_assert!((0.0..=1.0).contains(&p));
        if n == 0 || p <= 0.0 {
            return 0;
        }
        if p >= 1.0 {
            return n;
        }
        let u = self.next_f64();
        let q = 1.0 - p;
        // pmf(0) = q^n, then pmf(k+1) = pmf(k) * (n-k)/(k+1) * p/q
        let mut pmf = q.powi(n as i32);
        let mut cdf = pmf;
        let mut k = 0u32;
        while cdf < u && k < n {
            pmf *= (n - k) as f64 / (k + 1) as f64 * (p / q);
            cdf += pmf;
            k += 1;
        }
        k
    }

    /// Get current RNG state (for checkpointing/replay)
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Overwrite the RNG state with a previously captured value
    ///
    /// Every subsequent draw from this manager continues the captured
    /// stream exactly.
    pub fn restore_state(&mut self, state: u64) {
        self.state = if state == 0 { 1 } else { state };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = RngManager::new(0);
        assert_ne!(rng.state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    #[should_panic(expected = "min must be less than max")]
    fn test_range_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range(100, 50);
    }

    #[test]
    fn test_next_f64_in_range() {
        let mut rng = RngManager::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f64();
            assert!(
                val >= 0.0 && val < 1.0,
                "next_f64() produced value {} outside [0.0, 1.0)",
                val
            );
        }
    }

    #[test]
    fn test_next_f64_deterministic() {
        let mut rng1 = RngManager::new(99999);
        let mut rng2 = RngManager::new(99999);

        for _ in 0..100 {
            assert_eq!(rng1.next_f64(), rng2.next_f64(), "next_f64() not deterministic");
        }
    }

    #[test]
    fn test_restore_state_resumes_stream() {
        let mut rng = RngManager::new(777);
        rng.next();
        let saved = rng.state();
        let expected: Vec<u64> = (0..10).map(|_| rng.next()).collect();

        let mut resumed = RngManager::new(1);
        resumed.restore_state(saved);
        let actual: Vec<u64> = (0..10).map(|_| resumed.next()).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_geometric_degenerate_p_one() {
        let mut rng = RngManager::new(5);
        for _ in 0..10 {
            assert_eq!(rng.geometric(1.0), 0);
        }
    }

    #[test]
    fn test_geometric_mean_close_to_q_over_p() {
        let mut rng = RngManager::new(2024);
        let p = 0.25;
        let n = 20_000;
        let total: u64 = (0..n).map(|_| rng.geometric(p)).sum();
        let mean = total as f64 / n as f64;
        // E[X] = (1-p)/p = 3.0, sd of the mean ~ 0.024
        assert!((mean - 3.0).abs() < 0.15, "geometric mean {} far from 3.0", mean);
    }

    #[test]
    fn test_binomial_bounds_and_degenerate_cases() {
        let mut rng = RngManager::new(99);
        assert_eq!(rng.binomial(0, 0.5), 0);
        assert_eq!(rng.binomial(64, 0.0), 0);
        assert_eq!(rng.binomial(64, 1.0), 64);
        for _ in 0..1000 {
            let k = rng.binomial(64, 0.3);
            assert!(k <= 64);
        }
    }

    #[test]
    fn test_binomial_mean_close_to_np() {
        let mut rng = RngManager::new(31337);
        let n = 10_000;
        let total: u64 = (0..n).map(|_| rng.binomial(64, 0.5) as u64).sum();
        let mean = total as f64 / n as f64;
        // E = 32, sd of the mean = 4/sqrt(10000) = 0.04
        assert!((mean - 32.0).abs() < 0.3, "binomial mean {} far from 32", mean);
    }
}
