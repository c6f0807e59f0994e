//! Public index facade over the resident and memory-mapped backends.
//!
//! An index moves through three states: accepting vectors, built (resident
//! graph, searchable and saveable), and mapped (loaded from disk, searchable
//! without deserialisation). Both searchable states share one traversal via
//! [`NeighbourSource`].

use std::{fs, path::Path};

use crate::{
    config::{DistanceKind, HnswConfig},
    distance,
    error::{IndexError, Result},
    hnsw::{self, EntryPoint, Graph, LayerSearcher, Neighbour, NeighbourSource},
    io::{MappedIndex, save_index},
    store::{self, VectorStore},
};

/// Approximate nearest-neighbour index over fixed-dimension `f32` vectors.
///
/// # Examples
/// ```
/// use maguro_core::{DistanceKind, HnswConfig, HnswIndex};
///
/// let mut index = HnswIndex::new(2, DistanceKind::L2)?;
/// index.add_vector(&[0.0, 0.0])?;
/// index.add_vector(&[1.0, 0.0])?;
/// index.add_vector(&[5.0, 5.0])?;
/// index.build(HnswConfig::new(2, 4)?)?;
/// let hits = index.search(&[0.9, 0.1], 1, 10)?;
/// assert_eq!(hits[0].id, 1);
/// # Ok::<(), maguro_core::IndexError>(())
/// ```
#[derive(Debug)]
pub struct HnswIndex {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Resident {
        store: VectorStore,
        config: Option<HnswConfig>,
        graph: Option<Graph>,
    },
    Mapped(MappedIndex),
}

impl HnswIndex {
    /// Creates an empty index for `dim`-dimensional vectors under `kind`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidConfig`] when `dim` is zero.
    pub fn new(dim: usize, kind: DistanceKind) -> Result<Self> {
        Ok(Self {
            inner: Inner::Resident {
                store: VectorStore::new(dim, kind)?,
                config: None,
                graph: None,
            },
        })
    }

    /// Validates and ingests a vector, returning its dense id.
    ///
    /// # Errors
    /// Returns [`IndexError::AlreadyBuilt`] once the index has been built or
    /// loaded, and ingestion errors for wrong-dimension, non-finite, or
    /// (under the angular metric) zero-magnitude input.
    pub fn add_vector(&mut self, values: &[f32]) -> Result<usize> {
        match &mut self.inner {
            Inner::Resident {
                store,
                graph: None,
                ..
            } => store.push(values),
            _ => Err(IndexError::AlreadyBuilt),
        }
    }

    /// Constructs the graph over every ingested vector and freezes the index.
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] when no vectors were added and
    /// [`IndexError::AlreadyBuilt`] on a second build or on a loaded index.
    #[tracing::instrument(skip_all, fields(vectors = self.len()))]
    pub fn build(&mut self, config: HnswConfig) -> Result<()> {
        match &mut self.inner {
            Inner::Resident {
                store,
                config: config_slot,
                graph,
            } => {
                if graph.is_some() {
                    return Err(IndexError::AlreadyBuilt);
                }
                *graph = Some(hnsw::build(store, &config)?);
                *config_slot = Some(config);
                Ok(())
            }
            Inner::Mapped(_) => Err(IndexError::AlreadyBuilt),
        }
    }

    /// Returns the `k` approximate nearest neighbours of `query`, closest
    /// first, searching with a beam of `ef_search` (clamped up to `k`).
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] before a build and
    /// [`IndexError::DimensionMismatch`] or [`IndexError::NonFiniteValue`]
    /// for bad queries.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<Neighbour>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let ef = ef_search.max(k);
        match &self.inner {
            Inner::Resident { store, graph, .. } => {
                let graph = graph.as_ref().ok_or(IndexError::EmptyIndex)?;
                let prepared = store.prepare_query(query)?;
                let entry = graph.entry()?.ok_or(IndexError::EmptyIndex)?;
                run_search(graph, entry, |id| store.distance_to(&prepared, id), k, ef)
            }
            Inner::Mapped(mapped) => {
                let prepared = store::prepare_query(query, mapped.dim())?;
                let kind = mapped.kind();
                let dist = |id: usize| {
                    distance::evaluate(
                        kind,
                        prepared.values,
                        mapped.vector(id),
                        prepared.norm,
                        mapped.norm(id),
                    )
                };
                run_search(mapped, mapped.entry(), dist, k, ef)
            }
        }
    }

    /// Writes the index to `path` as a single file.
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] when the index has not been built
    /// and [`IndexError::Io`] on filesystem failures.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match &self.inner {
            Inner::Resident {
                store,
                config,
                graph,
            } => {
                let (graph, config) = graph
                    .as_ref()
                    .zip(config.as_ref())
                    .ok_or(IndexError::EmptyIndex)?;
                let entry = graph.entry()?.ok_or(IndexError::EmptyIndex)?;
                save_index(path, store, graph, config, entry)
            }
            // A mapped index is already in file form; copy the bytes through.
            Inner::Mapped(mapped) => {
                fs::write(path, mapped.as_bytes())?;
                Ok(())
            }
        }
    }

    /// Memory-maps a previously saved index; no vector or adjacency data is
    /// deserialised up front.
    ///
    /// # Errors
    /// Returns [`IndexError::Io`] when the file cannot be opened or mapped
    /// and [`IndexError::Corrupt`] when its structure is inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            inner: Inner::Mapped(MappedIndex::open(path.as_ref())?),
        })
    }

    /// Number of vectors in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Resident { store, .. } => store.len(),
            Inner::Mapped(mapped) => mapped.count(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension every input must match.
    #[must_use]
    pub fn dimension(&self) -> usize {
        match &self.inner {
            Inner::Resident { store, .. } => store.dim(),
            Inner::Mapped(mapped) => mapped.dim(),
        }
    }

    /// Metric the index was created with.
    #[must_use]
    pub fn distance_kind(&self) -> DistanceKind {
        match &self.inner {
            Inner::Resident { store, .. } => store.kind(),
            Inner::Mapped(mapped) => mapped.kind(),
        }
    }

    /// Top layer of one node; introspection for diagnostics and tests.
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] before a build.
    pub fn node_level(&self, id: usize) -> Result<usize> {
        match &self.inner {
            Inner::Resident { graph, .. } => {
                graph.as_ref().ok_or(IndexError::EmptyIndex)?.node_level(id)
            }
            Inner::Mapped(mapped) => mapped.node_level(id),
        }
    }

    /// Neighbour ids of one node at one layer; introspection for diagnostics
    /// and tests.
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] before a build.
    pub fn neighbours_of(&self, id: usize, level: usize) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        match &self.inner {
            Inner::Resident { graph, .. } => graph
                .as_ref()
                .ok_or(IndexError::EmptyIndex)?
                .copy_neighbours(id, level, &mut out)?,
            Inner::Mapped(mapped) => mapped.copy_neighbours(id, level, &mut out)?,
        }
        Ok(out)
    }

    /// Level of the current entry point.
    ///
    /// # Errors
    /// Returns [`IndexError::EmptyIndex`] before a build.
    pub fn max_level(&self) -> Result<usize> {
        match &self.inner {
            Inner::Resident { graph, .. } => Ok(graph
                .as_ref()
                .ok_or(IndexError::EmptyIndex)?
                .entry()?
                .ok_or(IndexError::EmptyIndex)?
                .level),
            Inner::Mapped(mapped) => Ok(mapped.entry().level),
        }
    }
}

/// Descends greedily from the entry point to layer 1, then beam-searches
/// layer 0 and keeps the `k` closest.
fn run_search<S: NeighbourSource>(
    source: &S,
    entry: EntryPoint,
    dist: impl Fn(usize) -> f32,
    k: usize,
    ef: usize,
) -> Result<Vec<Neighbour>> {
    let searcher = LayerSearcher::new(source, dist);
    let mut current = entry.node;
    for level in (1..=entry.level).rev() {
        current = searcher.greedy_descent(current, level)?;
    }
    let mut results = searcher.search_layer(current, 0, ef)?;
    results.truncate(k);
    Ok(results)
}
