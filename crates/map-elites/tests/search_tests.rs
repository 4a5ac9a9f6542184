//! Integration tests for the MAP-Elites search loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use map_elites::{Environment, Error, MapElites, MapElitesConfig, PointEnv, Result};

/// Environment whose `random_batch` always returns the same fixed genomes.
/// Genomes are `(fitness, behavior)` pairs evaluated verbatim.
struct FixedEnv {
    batch: Vec<(f64, f64)>,
    max_fitness: f64,
    generation_calls: AtomicUsize,
}

impl FixedEnv {
    fn new(batch: Vec<(f64, f64)>, max_fitness: f64) -> Self {
        Self {
            batch,
            max_fitness,
            generation_calls: AtomicUsize::new(0),
        }
    }
}

impl Environment for FixedEnv {
    type Genome = (f64, f64);

    fn behavior_bounds(&self) -> Vec<(f64, f64)> {
        vec![(0.0, 1.0)]
    }

    fn batch_size(&self) -> usize {
        self.batch.len()
    }

    fn max_fitness(&self) -> f64 {
        self.max_fitness
    }

    fn random_batch(&self) -> Result<Vec<(f64, f64)>> {
        self.generation_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.batch.clone())
    }

    fn mutate_batch(&self, parents: &[(f64, f64)]) -> Result<Vec<(f64, f64)>> {
        Ok(parents.to_vec())
    }

    fn fitness(&self, genome: &(f64, f64)) -> f64 {
        genome.0
    }

    fn phenotype(&self, genome: &(f64, f64)) -> Option<Vec<f64>> {
        Some(vec![genome.1])
    }
}

fn config_4() -> MapElitesConfig {
    MapElitesConfig {
        map_grid_size: 4,
        seed: Some(42),
        ..Default::default()
    }
}

#[test]
fn one_init_step_fills_both_niches() {
    // Genome A: fitness 1.0, phenotype [0.1] -> bin 0.
    // Genome B: fitness 2.0, phenotype [0.9] -> bin 3.
    let env = FixedEnv::new(vec![(1.0, 0.1), (2.0, 0.9)], 100.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();

    let outcome = archive.search(1, 1, 0.0).unwrap();

    assert_eq!(archive.niches_filled(), 2);
    assert_eq!(archive.maximum_fitness(), 2.0);
    assert_eq!(archive.qd_score(), 3.0);
    assert_eq!(archive.elite_at(&[0]).unwrap(), Some(&(1.0, 0.1)));
    assert_eq!(archive.elite_at(&[3]).unwrap(), Some(&(2.0, 0.9)));
    assert_eq!(archive.fitness_at(&[0]).unwrap(), 1.0);
    assert_eq!(outcome.best_fitness, 2.0);
    assert_eq!(outcome.best_genome, Some((2.0, 0.9)));
    assert_eq!(archive.best_fitness(), 2.0);
}

#[test]
fn early_stop_consumes_no_further_budget() {
    // The fitness ceiling is reached in the very first iteration.
    let env = FixedEnv::new(vec![(1.0, 0.1), (2.0, 0.9)], 2.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();

    let outcome = archive.search(1, 1000, 0.0).unwrap();

    assert_eq!(outcome.best_fitness, 2.0);
    assert_eq!(
        archive.env().generation_calls.load(Ordering::Relaxed),
        1,
        "search must stop after the iteration that hit the ceiling"
    );
}

#[test]
fn early_stop_abandons_rest_of_batch() {
    // The ceiling genome comes first in the batch, so the bin-0 candidate
    // behind it is never inserted.
    let env = FixedEnv::new(vec![(2.0, 0.9), (1.0, 0.1)], 2.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();

    archive.search(1, 10, 0.0).unwrap();

    assert_eq!(archive.niches_filled(), 1);
    assert_eq!(archive.elite_at(&[0]).unwrap(), None);
}

#[test]
fn tolerance_widens_the_stopping_window() {
    let env = FixedEnv::new(vec![(1.5, 0.5)], 2.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();

    archive.search(1, 50, 0.5).unwrap();
    assert_eq!(archive.env().generation_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn cancellation_stops_at_iteration_boundary() {
    let env = FixedEnv::new(vec![(1.0, 0.5)], 100.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();

    let cancel = AtomicBool::new(true);
    let outcome = archive.search_with_cancel(1, 100, 0.0, &cancel).unwrap();

    assert!(outcome.best_genome.is_none());
    assert_eq!(archive.env().generation_calls.load(Ordering::Relaxed), 0);
    assert_eq!(archive.niches_filled(), 0);
}

#[test]
fn search_over_point_env_converges() {
    let env = PointEnv::new(
        vec![(0.0, 1.0), (0.0, 1.0)],
        vec![0.5, 0.5],
        16,
        0.1,
        7,
    );
    let config = MapElitesConfig {
        map_grid_size: 8,
        seed: Some(7),
        ..Default::default()
    };
    let mut archive = MapElites::new(env, config).unwrap();

    // Tolerance 0.0 never triggers in a continuous space, so the full
    // budget is spent and the map fills broadly.
    let outcome = archive.search(5, 200, 0.0).unwrap();

    assert!(outcome.best_fitness > 0.8);
    assert!(archive.niches_filled() > 8);
    let stats = archive.stats();
    assert_eq!(stats.capacity, 64);
    assert_eq!(stats.niches_filled, archive.niches_filled());
    assert!(stats.qd_score <= stats.niches_filled as f64 * stats.max_fitness);
}

#[test]
fn seeded_runs_are_deterministic() {
    let run = || {
        let env = PointEnv::new(vec![(0.0, 1.0)], vec![0.3], 8, 0.05, 11);
        let config = MapElitesConfig {
            map_grid_size: 16,
            seed: Some(11),
            ..Default::default()
        };
        let mut archive = MapElites::new(env, config).unwrap();
        let outcome = archive.search(5, 60, 0.0).unwrap();
        (outcome.best_fitness, archive.niches_filled(), archive.qd_score())
    };

    assert_eq!(run(), run());
}

/// Every generated batch is one genome in bin 0 with strictly increasing
/// fitness, so the same niche is improved on every iteration.
struct ImprovingEnv {
    calls: AtomicUsize,
}

impl Environment for ImprovingEnv {
    type Genome = (f64, f64);

    fn behavior_bounds(&self) -> Vec<(f64, f64)> {
        vec![(0.0, 1.0)]
    }

    fn batch_size(&self) -> usize {
        1
    }

    fn max_fitness(&self) -> f64 {
        1000.0
    }

    fn random_batch(&self) -> Result<Vec<(f64, f64)>> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(vec![(n as f64 + 1.0, 0.1)])
    }

    fn mutate_batch(&self, parents: &[(f64, f64)]) -> Result<Vec<(f64, f64)>> {
        Ok(parents.to_vec())
    }

    fn fitness(&self, genome: &(f64, f64)) -> f64 {
        genome.0
    }

    fn phenotype(&self, genome: &(f64, f64)) -> Option<Vec<f64>> {
        Some(vec![genome.1])
    }
}

#[test]
fn history_length_keeps_map_metrics_fresh() {
    let env = ImprovingEnv {
        calls: AtomicUsize::new(0),
    };
    let config = MapElitesConfig {
        map_grid_size: 4,
        history_length: 3,
        seed: Some(42),
        ..Default::default()
    };
    let mut archive = MapElites::new(env, config).unwrap();

    // Four improvements to one niche exceed the history length; the
    // current-top view must still report the newest values only.
    archive.search(4, 4, 0.0).unwrap();
    assert_eq!(archive.fitness_at(&[0]).unwrap(), 4.0);
    assert_eq!(archive.qd_score(), 4.0);
    assert_eq!(archive.niches_filled(), 1);
    assert_eq!(archive.elite_at(&[0]).unwrap(), Some(&(4.0, 0.1)));
}

#[test]
fn stats_snapshot_serializes() {
    let env = FixedEnv::new(vec![(1.0, 0.1), (2.0, 0.9)], 100.0);
    let mut archive = MapElites::new(env, config_4()).unwrap();
    archive.search(1, 1, 0.0).unwrap();

    let json = serde_json::to_string(&archive.stats()).unwrap();
    let back: map_elites::ArchiveStats = serde_json::from_str(&json).unwrap();
    assert_eq!(back.niches_filled, 2);
    assert_eq!(back.capacity, 4);
    assert_eq!(back.max_fitness, 2.0);
}

#[test]
fn out_of_bounds_cell_access_is_an_error() {
    let env = FixedEnv::new(vec![(1.0, 0.1)], 100.0);
    let archive = MapElites::new(env, config_4()).unwrap();
    assert!(matches!(
        archive.fitness_at(&[7]),
        Err(Error::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        archive.elite_at(&[0, 0]),
        Err(Error::IndexOutOfBounds { .. })
    ));
}
