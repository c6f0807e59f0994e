//! Hierarchical navigable small-world graph construction and traversal.

mod builder;
mod graph;
mod insert;
mod level;
mod search;
mod select;
mod types;

pub(crate) use builder::build;
pub(crate) use graph::Graph;
pub(crate) use search::{LayerSearcher, NeighbourSource};
pub(crate) use types::EntryPoint;
pub use types::Neighbour;
