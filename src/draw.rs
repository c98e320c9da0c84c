//! The source of every random decision made by the crate.
//!
//! No random engine is global. Every stochastic operation takes an explicit `&mut R where R: Rng`
//! and the evolution loop forks one independently seeded engine per worker from a single master
//! engine, so a run is reproducible from its seed and worker count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Draws over the interval shapes used by tree construction, mutation and selection.
///
/// Implemented for every `Rng`, so any engine can be handed to the operators directly.
pub trait Draw: Rng {
    /// A uniform integer within the closed interval `[lo, hi]`.
    ///
    /// Undefined for `lo > hi`.
    fn uniform_int(&mut self, lo: usize, hi: usize) -> usize {
        self.gen_range(lo..=hi)
    }

    /// A uniform real within the half-open interval `[lo, hi)`.
    ///
    /// Undefined for `lo >= hi`.
    fn uniform_real(&mut self, lo: f64, hi: f64) -> f64 {
        self.gen_range(lo..hi)
    }

    /// A draw from the normal distribution `N(mean, stddev)`.
    fn normal(&mut self, mean: f64, stddev: f64) -> f64 {
        let z: f64 = self.sample(StandardNormal);
        mean + stddev * z
    }

    /// `true` with probability `p`, clamped to `[0, 1]`.
    fn bernoulli(&mut self, p: f64) -> bool {
        self.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Derive a new, independently seeded engine from this one.
    fn fork(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.gen())
    }
}

impl<R> Draw for R where R: Rng + ?Sized {}

/// The master engine for a run: seeded if a seed is given, from entropy otherwise.
pub fn engine(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_int_is_closed() {
        let mut rng = engine(Some(7));
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let n = rng.uniform_int(0, 3);
            assert!(n <= 3);
            seen[n] = true;
        }
        assert!(seen.iter().all(|&s| s), "both bounds must be reachable");
        assert_eq!(rng.uniform_int(5, 5), 5);
    }

    #[test]
    fn uniform_real_is_half_open() {
        let mut rng = engine(Some(7));
        for _ in 0..1_000 {
            let x = rng.uniform_real(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&x));
        }
    }

    #[test]
    fn bernoulli_extremes() {
        let mut rng = engine(Some(1));
        assert!((0..100).all(|_| rng.bernoulli(1.0)));
        assert!((0..100).all(|_| !rng.bernoulli(0.0)));
    }

    #[test]
    fn normal_is_centred() {
        let mut rng = engine(Some(3));
        let n = 20_000;
        let mean = (0..n).map(|_| rng.normal(5.0, 1.0)).sum::<f64>() / n as f64;
        assert!((mean - 5.0).abs() < 0.05, "mean {}", mean);
    }

    #[test]
    fn forks_are_reproducible() {
        let mut a = engine(Some(11));
        let mut b = engine(Some(11));
        let mut fa = a.fork();
        let mut fb = b.fork();
        for _ in 0..10 {
            assert_eq!(fa.gen::<u64>(), fb.gen::<u64>());
        }
    }
}
