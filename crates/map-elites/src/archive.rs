//! MAP-Elites archive and search loop.
//!
//! The archive keeps the best genome found so far for each niche of a
//! discretized behavior space and improves it by repeatedly sampling
//! filled niches, mutating their elites, and inserting candidates that
//! strictly beat the incumbent in their niche. Random generation seeds the
//! archive until mutation has elites to draw from.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorGrid, MapIndex};
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::map::Map;

/// Configuration for a MAP-Elites run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapElitesConfig {
    /// Bins per behavior dimension.
    pub map_grid_size: usize,
    /// Circular-history slots per niche in the fitness and genome stores.
    pub history_length: usize,
    /// Record every genome ever routed to a niche, not only winners.
    pub save_history: bool,
    /// Capacity of the ring buffer holding unmappable candidates.
    pub recycle_capacity: usize,
    /// RNG seed for reproducible runs; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl Default for MapElitesConfig {
    fn default() -> Self {
        Self {
            map_grid_size: 20,
            history_length: 1,
            save_history: false,
            recycle_capacity: 1000,
            seed: None,
        }
    }
}

/// Bounded ring of candidates whose phenotype could not be mapped.
///
/// Kept purely for diagnosis/reuse of failed mutations; never consulted by
/// selection. The write counter is monotonic, so the ring holds the most
/// recent `capacity` entries.
#[derive(Debug)]
struct RecycleBin<G> {
    slots: Vec<Option<G>>,
    count: usize,
}

impl<G> RecycleBin<G> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, count: 0 }
    }

    fn push(&mut self, genome: G) {
        let ix = self.count % self.slots.len();
        self.slots[ix] = Some(genome);
        self.count += 1;
    }

    /// Total candidates ever recycled, including overwritten ones.
    fn total(&self) -> usize {
        self.count
    }

    fn iter(&self) -> impl Iterator<Item = &G> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }
}

/// Best genome found by a search, with its fitness.
#[derive(Debug, Clone)]
pub struct SearchOutcome<G> {
    pub best_genome: Option<G>,
    pub best_fitness: f64,
}

/// Serializable snapshot of archive quality-diversity metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub niches_filled: usize,
    pub capacity: usize,
    pub qd_score: f64,
    pub max_fitness: f64,
    pub recycled_count: usize,
}

/// The MAP-Elites archive: three parallel cell stores over one indexing
/// scheme, a behavior discretizer, and the search loop driving them.
pub struct MapElites<E: Environment> {
    env: E,
    config: MapElitesConfig,
    grid: BehaviorGrid,
    /// Best fitness per niche; `-inf` until the niche is filled.
    fitnesses: Map<f64>,
    /// Genome achieving the niche's stored fitness.
    genomes: Map<Option<E::Genome>>,
    /// Whether any genome has ever been mapped into the niche.
    filled: Map<bool>,
    recycled: RecycleBin<E::Genome>,
    /// Every genome ever routed to each niche, when `save_history` is set.
    history: HashMap<Vec<usize>, Vec<E::Genome>>,
    rng: ChaCha8Rng,
    current_max_genome: Option<E::Genome>,
    current_max_fitness: f64,
}

impl<E: Environment> fmt::Debug for MapElites<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapElites")
            .field("config", &self.config)
            .field("grid", &self.grid)
            .field("fitnesses", &self.fitnesses)
            .field("filled", &self.filled)
            .field("current_max_fitness", &self.current_max_fitness)
            .finish_non_exhaustive()
    }
}

impl<E: Environment> MapElites<E> {
    /// Construct an empty archive for `env`.
    pub fn new(env: E, config: MapElitesConfig) -> Result<Self> {
        let bounds = env.behavior_bounds();
        let dims = vec![config.map_grid_size; bounds.len()];
        let fitnesses = Map::new(dims.clone(), f64::NEG_INFINITY, config.history_length)?;
        let genomes = Map::new(dims, None, config.history_length)?;
        Self::from_parts(env, config, bounds, fitnesses, genomes)
    }

    /// Resume from pre-existing fitness and genome stores.
    ///
    /// The filled-niche index is rebuilt from the finite cells of
    /// `fitnesses`; every such cell must hold a genome.
    pub fn from_maps(
        env: E,
        config: MapElitesConfig,
        fitnesses: Map<f64>,
        genomes: Map<Option<E::Genome>>,
    ) -> Result<Self> {
        let bounds = env.behavior_bounds();
        let expected = vec![config.map_grid_size; bounds.len()];
        if fitnesses.dims() != expected || genomes.dims() != expected {
            return Err(Error::Config(format!(
                "resume maps have dimensions {:?}/{:?}, expected {expected:?}",
                fitnesses.dims(),
                genomes.dims()
            )));
        }
        Self::from_parts(env, config, bounds, fitnesses, genomes)
    }

    fn from_parts(
        env: E,
        config: MapElitesConfig,
        bounds: Vec<(f64, f64)>,
        fitnesses: Map<f64>,
        genomes: Map<Option<E::Genome>>,
    ) -> Result<Self> {
        if env.behavior_dim() != bounds.len() {
            return Err(Error::Config(format!(
                "environment declares {} behavior dimensions but {} bounds",
                env.behavior_dim(),
                bounds.len()
            )));
        }
        if config.recycle_capacity == 0 {
            return Err(Error::Config(
                "recycle_capacity must be at least 1".to_string(),
            ));
        }
        let resolution = vec![config.map_grid_size; bounds.len()];
        let grid = BehaviorGrid::new(&bounds, &resolution)?;

        let mut filled = Map::new(resolution, false, 1)?;
        for lin in fitnesses.cells_matching(|v| v.is_finite()) {
            let ix = fitnesses.unravel(lin);
            if genomes.get(&ix)?.is_none() {
                return Err(Error::MissingElite(ix));
            }
            filled.set(&ix, true)?;
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };

        tracing::info!(
            dims = ?fitnesses.dims(),
            cells = fitnesses.size(),
            "constructed MAP-Elites archive"
        );

        Ok(Self {
            env,
            recycled: RecycleBin::new(config.recycle_capacity),
            config,
            grid,
            fitnesses,
            genomes,
            filled,
            history: HashMap::new(),
            rng,
            current_max_genome: None,
            current_max_fitness: f64::NEG_INFINITY,
        })
    }

    /// Discretize a phenotype to a cell address.
    pub fn to_map_index(&self, phenotype: Option<&[f64]>) -> MapIndex {
        self.grid.to_map_index(phenotype)
    }

    /// Uniformly sample one filled niche.
    ///
    /// Callers must guard with an emptiness check; the search loop never
    /// invokes this while the genome store is empty.
    pub fn random_selection(&mut self) -> Result<Vec<usize>> {
        let candidates = self.filled.cells_matching(|&b| b);
        if candidates.is_empty() {
            return Err(Error::NoFilledNiches);
        }
        let pick = candidates[self.rng.random_range(0..candidates.len())];
        Ok(self.filled.unravel(pick))
    }

    /// Run the search loop for up to `total_steps` iterations.
    ///
    /// The first `init_steps` iterations (and any iteration while the
    /// archive is still empty) request fresh random genomes; the rest
    /// mutate batches of sampled elites. Stops early once the best fitness
    /// comes within `tolerance` of the environment's declared maximum.
    pub fn search(
        &mut self,
        init_steps: usize,
        total_steps: usize,
        tolerance: f64,
    ) -> Result<SearchOutcome<E::Genome>> {
        self.search_with_cancel(init_steps, total_steps, tolerance, &AtomicBool::new(false))
    }

    /// [`search`](Self::search) with a cooperative cancellation flag,
    /// checked at iteration boundaries and after each candidate insertion,
    /// never mid-evaluation.
    pub fn search_with_cancel(
        &mut self,
        init_steps: usize,
        total_steps: usize,
        tolerance: f64,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome<E::Genome>> {
        let mut max_fitness = f64::NEG_INFINITY;
        let mut max_genome: Option<E::Genome> = None;
        if self.config.save_history {
            self.history = HashMap::new();
        }

        'steps: for step in 0..total_steps {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(step, "search cancelled");
                break;
            }

            let candidates = if step < init_steps || self.genomes.is_empty() {
                // While the archive is empty, mutation has no elites to
                // draw from; force generation.
                self.env.random_batch()?
            } else {
                let mut parents = Vec::with_capacity(self.env.batch_size());
                for _ in 0..self.env.batch_size() {
                    let ix = self.random_selection()?;
                    let elite = self
                        .genomes
                        .get(&ix)?
                        .clone()
                        .ok_or(Error::MissingElite(ix))?;
                    parents.push(elite);
                }
                self.env.mutate_batch(&parents)?
            };

            // Fitness and phenotype are pure, so the batch is evaluated in
            // parallel; insertions below stay serial and in batch order.
            let env = &self.env;
            let evaluated: Vec<_> = candidates
                .into_par_iter()
                .map(|genome| {
                    let fitness = env.fitness(&genome);
                    let phenotype = env.phenotype(&genome);
                    (genome, fitness, phenotype)
                })
                .collect();

            for (genome, fitness, phenotype) in evaluated {
                if !fitness.is_finite() {
                    // Evaluation failure; drop the candidate outright.
                    continue;
                }
                let Some(map_ix) = self.grid.to_map_index(phenotype.as_deref()) else {
                    // Unmappable phenotype; keep a bounded sample around
                    // for diagnosis.
                    self.recycled.push(genome);
                    continue;
                };

                if self.config.save_history {
                    self.history
                        .entry(map_ix.clone())
                        .or_default()
                        .push(genome.clone());
                }
                self.filled.set(&map_ix, true)?;

                // Elitist replacement: strictly better only, so ties keep
                // the incumbent and per-niche fitness never regresses.
                if fitness > *self.fitnesses.get(&map_ix)? {
                    self.fitnesses.set(&map_ix, fitness)?;
                    self.genomes.set(&map_ix, Some(genome.clone()))?;
                }

                if fitness > max_fitness {
                    max_fitness = fitness;
                    max_genome = Some(genome);
                    tracing::info!(step, max_fitness, "new best fitness");
                }

                if (max_fitness - self.env.max_fitness()).abs() <= tolerance {
                    // Remaining candidates in this batch are abandoned.
                    tracing::info!(step, max_fitness, "within tolerance of max fitness");
                    break 'steps;
                }
                if cancel.load(Ordering::Relaxed) {
                    tracing::info!(step, "search cancelled");
                    break 'steps;
                }
            }
        }

        self.current_max_genome = max_genome.clone();
        self.current_max_fitness = max_fitness;
        Ok(SearchOutcome {
            best_genome: max_genome,
            best_fitness: max_fitness,
        })
    }

    /// Elite genome currently stored at a cell, if any.
    pub fn elite_at(&self, index: &[usize]) -> Result<Option<&E::Genome>> {
        Ok(self.genomes.get(index)?.as_ref())
    }

    /// Fitness currently stored at a cell; `-inf` when unfilled.
    pub fn fitness_at(&self, index: &[usize]) -> Result<f64> {
        Ok(*self.fitnesses.get(index)?)
    }

    /// Number of niches that have been explored.
    pub fn niches_filled(&self) -> usize {
        self.fitnesses.niches_filled()
    }

    /// Best fitness stored anywhere in the map.
    pub fn maximum_fitness(&self) -> f64 {
        self.fitnesses.maximum()
    }

    /// Sum of fitness over all filled niches.
    pub fn qd_score(&self) -> f64 {
        self.fitnesses.qd_score()
    }

    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats {
            niches_filled: self.niches_filled(),
            capacity: self.fitnesses.size(),
            qd_score: self.qd_score(),
            max_fitness: self.maximum_fitness(),
            recycled_count: self.recycled.total(),
        }
    }

    /// Total candidates ever recycled (monotonic; the ring retains only
    /// the most recent `recycle_capacity`).
    pub fn recycled_count(&self) -> usize {
        self.recycled.total()
    }

    /// The retained sample of recycled candidates.
    pub fn recycled(&self) -> impl Iterator<Item = &E::Genome> {
        self.recycled.iter()
    }

    /// Per-niche insertion history; empty unless `save_history` is set.
    pub fn history(&self) -> &HashMap<Vec<usize>, Vec<E::Genome>> {
        &self.history
    }

    /// Best genome seen by the most recent search.
    pub fn best_genome(&self) -> Option<&E::Genome> {
        self.current_max_genome.as_ref()
    }

    /// Fitness of the best genome seen by the most recent search.
    pub fn best_fitness(&self) -> f64 {
        self.current_max_fitness
    }

    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E: Environment> MapElites<E>
where
    E::Genome: Display,
{
    /// String form of the best genome from the most recent search.
    pub fn best_genome_string(&self) -> Option<String> {
        self.current_max_genome.as_ref().map(|g| g.to_string())
    }
}
