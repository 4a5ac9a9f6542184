//! Error types for the map-elites crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Construction-time parameter validation failure.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A cell index was out of bounds or had the wrong rank. Indices are
    /// produced by the discretizer, so hitting this means an internal
    /// invariant was violated.
    #[error("map index {index:?} out of bounds for dimensions {dims:?}")]
    IndexOutOfBounds { index: Vec<usize>, dims: Vec<usize> },

    /// Niche selection was invoked on an archive with no filled cells.
    #[error("no filled niches to select from")]
    NoFilledNiches,

    /// A cell marked filled held no genome. Internal invariant violation.
    #[error("filled niche {0:?} holds no genome")]
    MissingElite(Vec<usize>),

    /// The environment collaborator failed (e.g. a mutation batch call
    /// raised). Not recoverable by the search loop.
    #[error("environment failure: {0}")]
    Environment(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an environment-side failure.
    pub fn environment(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Environment(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
