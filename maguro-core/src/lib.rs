//! Approximate nearest-neighbour search over hierarchical navigable
//! small-world graphs.
//!
//! Vectors are ingested into a flat store, a multi-layer proximity graph is
//! built over them in parallel, and queries descend the hierarchy greedily
//! before a best-first beam search over the bottom layer. Built indexes
//! serialise to a single file that can be memory-mapped and searched without
//! deserialisation.
//!
//! Three metrics are supported, each returning a score where lower means
//! closer: angular (`1 - cosine`), squared L2, and negated dot product.
//!
//! # Examples
//! ```
//! use maguro_core::{DistanceKind, HnswConfig, HnswIndex};
//!
//! let mut index = HnswIndex::new(3, DistanceKind::L2)?;
//! index.add_vector(&[0.0, 0.0, 0.0])?;
//! index.add_vector(&[1.0, 0.0, 0.0])?;
//! index.add_vector(&[0.0, 2.0, 0.0])?;
//!
//! let config = HnswConfig::new(2, 8)?.with_n_threads(1).with_rng_seed(42);
//! index.build(config)?;
//!
//! let hits = index.search(&[0.9, 0.1, 0.0], 2, 10)?;
//! assert_eq!(hits[0].id, 1);
//! # Ok::<(), maguro_core::IndexError>(())
//! ```

mod config;
mod distance;
mod error;
mod hnsw;
mod index;
mod io;
mod store;

pub use config::{DistanceKind, HnswConfig, NeighbourPolicy, PostProcessing};
pub use error::{IndexError, IndexErrorCode, Result};
pub use hnsw::Neighbour;
pub use index::HnswIndex;
