//! Sampling Tests - statistical equivalence of strategies
//!
//! The three sampling strategies (per-bit Bernoulli, geometric skip,
//! word-level extraction) implement the same Bernoulli(rate) process
//! with different RNG consumption, so outputs are compared on aggregate
//! statistics, never bit-for-bit.
//!
//! Tolerances are set at six standard errors of the estimated mean, so
//! spurious failures are vanishingly unlikely for a fixed seed.

use popsim_core::{Bitset, RngManager};

const POPULATION: usize = 10_000;
const TRIALS: usize = 200;

/// Mean retained count over `TRIALS` draws with the given strategy
fn mean_retained(strategy: &str, rate: f64, rng: &mut RngManager) -> f64 {
    let bs = Bitset::full(POPULATION).unwrap();
    let mut total = 0usize;
    for _ in 0..TRIALS {
        let sampled = match strategy {
            "bernoulli" => bs.sample_bernoulli(rate, rng).unwrap(),
            "skip" => bs.sample_skip(rate, rng).unwrap(),
            "words" => bs.sample_words(rate, rng).unwrap(),
            _ => bs.sample(rate, rng).unwrap(),
        };
        total += sampled.count();
    }
    total as f64 / TRIALS as f64
}

/// Six standard errors of the mean retained count
fn tolerance(rate: f64) -> f64 {
    let variance = POPULATION as f64 * rate * (1.0 - rate);
    6.0 * (variance / TRIALS as f64).sqrt()
}

#[test]
fn test_mean_converges_to_rate_times_size() {
    let mut rng = RngManager::new(20240901);
    for &rate in &[0.01, 0.05, 0.3, 0.7, 0.95] {
        let expected = rate * POPULATION as f64;
        for strategy in ["bernoulli", "skip", "words", "auto"] {
            let mean = mean_retained(strategy, rate, &mut rng);
            assert!(
                (mean - expected).abs() < tolerance(rate),
                "strategy {} at rate {}: mean {} vs expected {}",
                strategy,
                rate,
                mean,
                expected
            );
        }
    }
}

#[test]
fn test_strategies_statistically_equivalent() {
    let mut rng = RngManager::new(777);
    let rate = 0.2;
    let baseline = mean_retained("bernoulli", rate, &mut rng);
    for strategy in ["skip", "words"] {
        let mean = mean_retained(strategy, rate, &mut rng);
        // Two independent means: compare within combined tolerance
        assert!(
            (mean - baseline).abs() < 2.0 * tolerance(rate),
            "strategy {} mean {} diverges from baseline {}",
            strategy,
            mean,
            baseline
        );
    }
}

#[test]
fn test_sampling_respects_sparse_membership() {
    // Strategies must only ever retain bits that were set
    let mut rng = RngManager::new(99);
    let sparse = Bitset::from_indices(POPULATION, &[7, 123, 4567, 9999]).unwrap();
    for _ in 0..100 {
        for sampled in [
            sparse.sample_bernoulli(0.5, &mut rng).unwrap(),
            sparse.sample_skip(0.5, &mut rng).unwrap(),
            sparse.sample_words(0.5, &mut rng).unwrap(),
        ] {
            assert_eq!(sampled.and(&sparse).unwrap(), sampled);
            assert_eq!(sampled.size(), POPULATION);
        }
    }
}

#[test]
fn test_sparse_sampling_rate_on_set_bits_only() {
    // rate applies per set bit, independent of population size
    let mut rng = RngManager::new(4242);
    let set_count = 2_000;
    let indices: Vec<usize> = (0..set_count).map(|i| i * 5).collect();
    let sparse = Bitset::from_indices(POPULATION, &indices).unwrap();

    let rate = 0.25;
    let mut total = 0usize;
    for _ in 0..TRIALS {
        total += sparse.sample(rate, &mut rng).unwrap().count();
    }
    let mean = total as f64 / TRIALS as f64;
    let expected = rate * set_count as f64;
    let variance = set_count as f64 * rate * (1.0 - rate);
    let tol = 6.0 * (variance / TRIALS as f64).sqrt();
    assert!(
        (mean - expected).abs() < tol,
        "sparse mean {} vs expected {}",
        mean,
        expected
    );
}

#[test]
fn test_extreme_rates_exact() {
    let mut rng = RngManager::new(5);
    let bs = Bitset::full(1000).unwrap();
    assert_eq!(bs.sample(0.0, &mut rng).unwrap().count(), 0);
    assert_eq!(bs.sample(1.0, &mut rng).unwrap().count(), 1000);
}

#[test]
fn test_invalid_rate_rejected_by_all_strategies() {
    let mut rng = RngManager::new(5);
    let bs = Bitset::full(100).unwrap();
    assert!(bs.sample(1.5, &mut rng).is_err());
    assert!(bs.sample_bernoulli(-0.5, &mut rng).is_err());
    assert!(bs.sample_skip(2.0, &mut rng).is_err());
    assert!(bs.sample_words(f64::NAN, &mut rng).is_err());
}
