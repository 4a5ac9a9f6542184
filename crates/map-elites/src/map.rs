//! Dimensioned cell store with optional per-cell circular history.
//!
//! A [`Map`] holds one value per cell of a discretized space. The archive
//! keeps three of these over the same dimensions: per-niche fitness
//! (`Map<f64>`), per-niche elite genome (`Map<Option<G>>`), and a
//! per-niche filled flag (`Map<bool>`).
//!
//! With `history_length > 1` every cell becomes a circular buffer: each
//! write advances that cell's top pointer and lands in a fresh slot, and
//! reads always return the most recently written slot. Storage is a flat
//! arena indexed by a row-major linearized coordinate, so reads and writes
//! are O(1) in any dimensionality.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dense grid of cells with an optional circular history per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map<T> {
    dims: Vec<usize>,
    history_length: usize,
    fill: T,
    /// History-major layout: slot `s` of cell `lin` lives at `s * size + lin`.
    data: Vec<T>,
    /// Per-cell index of the most recently written slot. Empty when
    /// `history_length == 1`.
    top: Vec<usize>,
    empty: bool,
}

impl<T: Clone> Map<T> {
    /// Create a store of shape `dims` where every cell reads as `fill`
    /// until first written.
    pub fn new(dims: Vec<usize>, fill: T, history_length: usize) -> Result<Self> {
        if history_length == 0 {
            return Err(Error::Config(
                "history_length must be at least 1".to_string(),
            ));
        }
        if dims.is_empty() || dims.iter().any(|&d| d == 0) {
            return Err(Error::Config(format!(
                "map dimensions must be non-empty and positive, got {dims:?}"
            )));
        }
        let size: usize = dims.iter().product();
        let top = if history_length > 1 {
            // Start tops at the last slot so the first write wraps to slot 0.
            vec![history_length - 1; size]
        } else {
            Vec::new()
        };
        Ok(Self {
            dims,
            history_length,
            data: vec![fill.clone(); size * history_length],
            fill,
            top,
            empty: true,
        })
    }

    /// Read the current value at `index`: the fill value if the cell was
    /// never written, otherwise the most recently written history slot.
    pub fn get(&self, index: &[usize]) -> Result<&T> {
        let lin = self.linearize(index)?;
        Ok(&self.data[self.slot_of(lin) * self.size() + lin])
    }

    /// Write `value` at `index`, advancing the cell's history top pointer
    /// so the write occupies a fresh slot. Old slots are only overwritten
    /// after `history_length` writes to the same cell.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let lin = self.linearize(index)?;
        let size = self.size();
        let slot = if self.history_length > 1 {
            let next = (self.top[lin] + 1) % self.history_length;
            self.top[lin] = next;
            next
        } else {
            0
        };
        self.data[slot * size + lin] = value;
        self.empty = false;
        Ok(())
    }

    /// Shape of the store, excluding the history axis.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    /// Number of cells (product of dimensions, excluding history).
    pub fn size(&self) -> usize {
        self.data.len() / self.history_length
    }

    /// True until the first write.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Linear indices (row-major) of cells whose current value matches
    /// `pred`.
    pub fn cells_matching<F>(&self, pred: F) -> Vec<usize>
    where
        F: Fn(&T) -> bool,
    {
        self.current().enumerate()
            .filter_map(|(lin, v)| pred(v).then_some(lin))
            .collect()
    }

    /// Iterate the current-top view of every cell in linear order.
    pub fn current(&self) -> impl Iterator<Item = &T> {
        let size = self.size();
        (0..size).map(move |lin| &self.data[self.slot_of(lin) * size + lin])
    }

    /// Convert a linear cell index back to a full-rank coordinate.
    pub fn unravel(&self, mut lin: usize) -> Vec<usize> {
        let mut index = vec![0; self.dims.len()];
        for (pos, &dim) in index.iter_mut().zip(self.dims.iter()).rev() {
            *pos = lin % dim;
            lin /= dim;
        }
        index
    }

    fn slot_of(&self, lin: usize) -> usize {
        if self.history_length > 1 {
            self.top[lin]
        } else {
            0
        }
    }

    fn linearize(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.dims.len()
            || index.iter().zip(self.dims.iter()).any(|(&i, &d)| i >= d)
        {
            return Err(Error::IndexOutOfBounds {
                index: index.to_vec(),
                dims: self.dims.clone(),
            });
        }
        Ok(index
            .iter()
            .zip(self.dims.iter())
            .fold(0, |lin, (&i, &d)| lin * d + i))
    }
}

impl Map<f64> {
    /// Quality-diversity score: sum of all finite values in the current-top
    /// view. Zero for an archive with no finite cells.
    pub fn qd_score(&self) -> f64 {
        self.current().filter(|v| v.is_finite()).sum()
    }

    /// Maximum value over the current-top view.
    pub fn maximum(&self) -> f64 {
        self.current().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Number of cells holding a finite value.
    pub fn niches_filled(&self) -> usize {
        self.current().filter(|v| v.is_finite()).count()
    }
}
