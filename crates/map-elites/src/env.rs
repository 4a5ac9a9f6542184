//! The environment capability interface.
//!
//! The archive treats genome representation, generation, mutation, and
//! evaluation as external concerns behind this trait. Anything that can
//! synthesize random genomes, mutate a batch of elites (including by
//! calling out to a generative model), score a genome, and project it into
//! behavior space can drive the search loop.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::Phenotype;

/// A domain that the MAP-Elites archive can search over.
///
/// Batch calls (`random_batch`, `mutate_batch`) block until a batch is
/// available or fail with an environment error; the search loop surfaces
/// such failures to its caller rather than continuing against a poisoned
/// environment. `fitness` and `phenotype` must be pure functions of the
/// genome, which lets the archive evaluate a batch in parallel.
pub trait Environment: Sync {
    /// A candidate solution.
    type Genome: Clone + Send + Sync;

    /// Declared `(min, max)` behavior bounds, one pair per dimension.
    /// Queried once at archive construction.
    fn behavior_bounds(&self) -> Vec<(f64, f64)>;

    /// Number of behavior dimensions. Must agree with `behavior_bounds`.
    fn behavior_dim(&self) -> usize {
        self.behavior_bounds().len()
    }

    /// Number of candidates produced per generation/mutation call.
    fn batch_size(&self) -> usize;

    /// Known achievable fitness ceiling, used for early stopping.
    fn max_fitness(&self) -> f64;

    /// Synthesize a batch of fresh random genomes.
    fn random_batch(&self) -> Result<Vec<Self::Genome>>;

    /// Mutate a batch of elite genomes into new candidates.
    fn mutate_batch(&self, parents: &[Self::Genome]) -> Result<Vec<Self::Genome>>;

    /// Score a genome. An infinite value means the genome could not be
    /// evaluated and the candidate is discarded.
    fn fitness(&self, genome: &Self::Genome) -> f64;

    /// Project a genome into behavior space, or `None` when it produced no
    /// valid behavior signal (the candidate is recycled, not dropped).
    fn phenotype(&self, genome: &Self::Genome) -> Phenotype;
}

/// Toy environment over real-vector genomes, used in docs, tests, and
/// benches.
///
/// Fitness is highest (1.0) at a target point and falls off with squared
/// distance; the phenotype is the genome itself, so behavior space is the
/// search space.
pub struct PointEnv {
    bounds: Vec<(f64, f64)>,
    target: Vec<f64>,
    batch_size: usize,
    mutation_scale: f64,
    rng: Mutex<ChaCha8Rng>,
}

impl PointEnv {
    pub fn new(
        bounds: Vec<(f64, f64)>,
        target: Vec<f64>,
        batch_size: usize,
        mutation_scale: f64,
        seed: u64,
    ) -> Self {
        Self {
            bounds,
            target,
            batch_size,
            mutation_scale,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Environment for PointEnv {
    type Genome = Vec<f64>;

    fn behavior_bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.clone()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn max_fitness(&self) -> f64 {
        1.0
    }

    fn random_batch(&self) -> Result<Vec<Vec<f64>>> {
        let mut rng = self.rng.lock();
        Ok((0..self.batch_size)
            .map(|_| {
                self.bounds
                    .iter()
                    .map(|&(min, max)| rng.random_range(min..max))
                    .collect()
            })
            .collect())
    }

    fn mutate_batch(&self, parents: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let mut rng = self.rng.lock();
        let s = self.mutation_scale;
        Ok(parents
            .iter()
            .map(|p| {
                p.iter()
                    .map(|&x| x + rng.random_range(-s..s))
                    .collect()
            })
            .collect())
    }

    fn fitness(&self, genome: &Vec<f64>) -> f64 {
        let sq_dist: f64 = genome
            .iter()
            .zip(self.target.iter())
            .map(|(x, t)| (x - t) * (x - t))
            .sum();
        1.0 - sq_dist
    }

    fn phenotype(&self, genome: &Vec<f64>) -> Phenotype {
        Some(genome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> PointEnv {
        PointEnv::new(vec![(0.0, 1.0), (0.0, 1.0)], vec![0.5, 0.5], 8, 0.1, 7)
    }

    #[test]
    fn random_batch_respects_bounds_and_size() {
        let env = env();
        let batch = env.random_batch().unwrap();
        assert_eq!(batch.len(), env.batch_size());
        for genome in &batch {
            assert_eq!(genome.len(), env.behavior_dim());
            for (&x, &(min, max)) in genome.iter().zip(env.behavior_bounds().iter()) {
                assert!(x >= min && x < max);
            }
        }
    }

    #[test]
    fn fitness_peaks_at_target() {
        let env = env();
        assert_eq!(env.fitness(&vec![0.5, 0.5]), env.max_fitness());
        assert!(env.fitness(&vec![0.9, 0.1]) < env.max_fitness());
    }

    #[test]
    fn mutation_preserves_batch_shape() {
        let env = env();
        let parents = env.random_batch().unwrap();
        let children = env.mutate_batch(&parents).unwrap();
        assert_eq!(children.len(), parents.len());
        assert_ne!(children, parents);
    }
}
