//! # map-elites
//!
//! MAP-Elites quality-diversity optimization over a discretized behavior
//! space.
//!
//! Given an [`Environment`] that can generate random genomes, mutate
//! batches of elites, and score a genome's fitness and behavior, the
//! archive keeps the best genome found for every niche of behavior space
//! and improves the whole map under a bounded iteration budget.
//!
//! ## Features
//!
//! - **Typed cell stores**: fitness, genome, and filled-flag grids share
//!   one flat, linearized indexing scheme ([`Map`])
//! - **Per-niche circular history**: optional `history_length > 1` buffers
//!   older elites per cell without unbounded growth
//! - **Digitize discretization**: out-of-range phenotypes clamp to edge
//!   bins instead of erroring ([`BehaviorGrid`])
//! - **Bounded recycle ring**: unmappable candidates are retained for
//!   diagnosis without unbounded memory use
//! - **Early stopping**: terminates once the best fitness is within a
//!   tolerance of the environment's known maximum
//!
//! ## Quick start
//!
//! ```rust
//! use map_elites::{MapElites, MapElitesConfig, PointEnv};
//!
//! // 2-D behavior space; fitness peaks at the target point.
//! let env = PointEnv::new(
//!     vec![(0.0, 1.0), (0.0, 1.0)],
//!     vec![0.5, 0.5],
//!     8,    // batch size
//!     0.05, // mutation scale
//!     42,   // seed
//! );
//! let config = MapElitesConfig {
//!     map_grid_size: 8,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let mut archive = MapElites::new(env, config).unwrap();
//! let outcome = archive.search(10, 100, 0.01).unwrap();
//!
//! assert!(outcome.best_genome.is_some());
//! assert!(archive.niches_filled() > 0);
//! ```

pub mod archive;
pub mod behavior;
pub mod env;
pub mod error;
pub mod map;

pub use archive::{ArchiveStats, MapElites, MapElitesConfig, SearchOutcome};
pub use behavior::{BehaviorGrid, MapIndex, Phenotype};
pub use env::{Environment, PointEnv};
pub use error::{Error, Result};
pub use map::Map;
