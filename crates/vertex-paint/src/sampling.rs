//! Seeded vertex-subset selection for entire-mesh painting
//!
//! Selection must be replayable: the seed (explicit or freshly drawn) is
//! echoed in the result so a recipient - e.g. a client re-simulating a
//! server's paint - can reproduce the exact same subset.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Use the caller's seed, or draw a fresh one to echo back.
pub fn seed_or_random(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Per-vertex selection stream, deterministic for a given seed.
///
/// One roll is consumed per candidate vertex regardless of the outcome, so
/// the selection of vertex N never depends on how earlier vertices rolled.
pub struct SubsetSampler {
    rng: Pcg32,
}

impl SubsetSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Whether the next vertex is selected at the given probability (0-1).
    pub fn select(&mut self, probability: f32) -> bool {
        self.rng.random::<f32>() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_selection() {
        let mut a = SubsetSampler::new(42);
        let mut b = SubsetSampler::new(42);
        for _ in 0..256 {
            assert_eq!(a.select(0.5), b.select(0.5));
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = SubsetSampler::new(1);
        let mut b = SubsetSampler::new(2);
        let differs = (0..256).any(|_| a.select(0.5) != b.select(0.5));
        assert!(differs);
    }

    #[test]
    fn test_full_probability_selects_everything() {
        let mut sampler = SubsetSampler::new(7);
        assert!((0..256).all(|_| sampler.select(1.0)));
    }

    #[test]
    fn test_zero_probability_selects_nothing() {
        let mut sampler = SubsetSampler::new(7);
        assert!((0..256).all(|_| !sampler.select(0.0)));
    }

    #[test]
    fn test_explicit_seed_is_kept() {
        assert_eq!(seed_or_random(Some(99)), 99);
    }
}
