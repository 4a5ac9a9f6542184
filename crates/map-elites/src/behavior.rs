//! Behavior-space discretization.
//!
//! A phenotype is a point in continuous behavior space; the grid converts
//! it to an integer cell index per dimension using fixed interior cut
//! points. Out-of-range phenotypes clamp to the nearest edge bin rather
//! than erroring, so an environment with loosely estimated bounds still
//! maps every valid phenotype somewhere.

use crate::error::{Error, Result};

/// A point in behavior space, or `None` when the genome produced no valid
/// behavior signal.
pub type Phenotype = Option<Vec<f64>>;

/// A cell address: one bin index per behavior dimension, or `None` for an
/// unmappable phenotype.
pub type MapIndex = Option<Vec<usize>>;

/// Per-dimension bin edges over declared behavior bounds.
#[derive(Debug, Clone)]
pub struct BehaviorGrid {
    /// `resolution[d] - 1` interior cut points per dimension, ascending.
    edges: Vec<Vec<f64>>,
    resolution: Vec<usize>,
}

impl BehaviorGrid {
    /// Partition each `(min, max)` bound into `resolution[d]` uniform bins.
    ///
    /// The two outer edges are dropped, so values below `min` fall in bin 0
    /// and values above `max` fall in the last bin.
    pub fn new(bounds: &[(f64, f64)], resolution: &[usize]) -> Result<Self> {
        if bounds.len() != resolution.len() {
            return Err(Error::Config(format!(
                "behavior bounds cover {} dimensions but resolution covers {}",
                bounds.len(),
                resolution.len()
            )));
        }
        let mut edges = Vec::with_capacity(bounds.len());
        for (&(min, max), &g) in bounds.iter().zip(resolution.iter()) {
            if g == 0 {
                return Err(Error::Config(
                    "grid resolution must be at least 1".to_string(),
                ));
            }
            if !(min < max) || !min.is_finite() || !max.is_finite() {
                return Err(Error::Config(format!(
                    "behavior bounds must be finite with min < max, got ({min}, {max})"
                )));
            }
            let step = (max - min) / g as f64;
            edges.push((1..g).map(|i| min + step * i as f64).collect());
        }
        Ok(Self {
            edges,
            resolution: resolution.to_vec(),
        })
    }

    /// Discretize a phenotype to a map index.
    ///
    /// `None` passes through; a phenotype of the wrong dimensionality is
    /// unmappable. Each coordinate lands in the bin whose cut points
    /// bracket it, with exact hits on a cut point going to the upper bin.
    pub fn to_map_index(&self, phenotype: Option<&[f64]>) -> MapIndex {
        let b = phenotype?;
        if b.len() != self.edges.len() {
            return None;
        }
        Some(
            b.iter()
                .zip(self.edges.iter())
                .map(|(&x, edges)| edges.partition_point(|&e| e <= x))
                .collect(),
        )
    }

    /// Bins per dimension.
    pub fn resolution(&self) -> &[usize] {
        &self.resolution
    }

    /// Number of behavior dimensions.
    pub fn dims(&self) -> usize {
        self.resolution.len()
    }
}
