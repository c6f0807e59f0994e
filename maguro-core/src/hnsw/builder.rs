//! Graph construction: the parallel insertion pass and the optional
//! merge pass.
//!
//! A dedicated rayon pool sized to the configured thread count runs each
//! pass, so builds never compete with a global pool the caller may be using.
//! With one thread and a fixed seed the whole build is reproducible.

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::{
    config::{HnswConfig, PostProcessing},
    error::{IndexError, Result},
    hnsw::{
        graph::Graph,
        insert::Inserter,
        level::{LevelSampler, splitmix64},
        search::NeighbourSource,
        select::select_neighbours,
        types::Neighbour,
    },
    store::VectorStore,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InsertionOrder {
    Forward,
    Reverse,
}

/// Builds the graph over every vector currently in `store`.
///
/// # Errors
/// Returns [`IndexError::EmptyIndex`] when the store holds no vectors and
/// [`IndexError::InvalidConfig`] when the thread pool cannot be created.
pub(crate) fn build(store: &VectorStore, config: &HnswConfig) -> Result<Graph> {
    if store.is_empty() {
        return Err(IndexError::EmptyIndex);
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.n_threads())
        .build()
        .map_err(|err| IndexError::InvalidConfig {
            reason: format!("failed to create build thread pool: {err}"),
        })?;

    let primary = build_pass(
        store,
        config,
        &pool,
        config.rng_seed(),
        InsertionOrder::Forward,
    )?;

    if config.post_processing() == PostProcessing::MergeLevel0 {
        tracing::debug!(vectors = store.len(), "starting merge pass");
        let secondary = build_pass(
            store,
            config,
            &pool,
            splitmix64(config.rng_seed()),
            InsertionOrder::Reverse,
        )?;
        merge_level0(&primary, &secondary, store, config, &pool)?;
    }
    Ok(primary)
}

fn build_pass(
    store: &VectorStore,
    config: &HnswConfig,
    pool: &ThreadPool,
    seed: u64,
    order: InsertionOrder,
) -> Result<Graph> {
    let count = store.len();
    tracing::debug!(vectors = count, ?order, "starting insertion pass");
    let graph = Graph::with_capacity(count);

    pool.install(|| {
        let sampler = LevelSampler::new(config.m(), config.max_level(), seed);
        let mut ids: Vec<usize> = (0..count).collect();
        if order == InsertionOrder::Reverse {
            ids.reverse();
        }

        let (&first, rest) = ids.split_first().ok_or(IndexError::EmptyIndex)?;
        graph.seed(first, sampler.sample()?)?;

        let inserter = Inserter::new(&graph, store, config);
        rest.par_iter().try_for_each(|&node| {
            let level = sampler.sample()?;
            inserter.insert(node, level)
        })
    })?;

    Ok(graph)
}

/// Unions each node's layer-0 lists from both graphs and re-selects down to
/// the layer-0 cap, improving connectivity without touching upper layers.
fn merge_level0(
    primary: &Graph,
    secondary: &Graph,
    store: &VectorStore,
    config: &HnswConfig,
    pool: &ThreadPool,
) -> Result<()> {
    pool.install(|| {
        (0..store.len()).into_par_iter().try_for_each(|node| {
            let mut merged = Vec::new();
            primary.copy_neighbours(node, 0, &mut merged)?;
            let mut from_secondary = Vec::new();
            secondary.copy_neighbours(node, 0, &mut from_secondary)?;
            merged.extend(from_secondary);
            merged.sort_unstable();
            merged.dedup();
            merged.retain(|&id| id != node);

            let candidates: Vec<Neighbour> = merged
                .into_iter()
                .map(|id| Neighbour {
                    id,
                    distance: store.distance(node, id),
                })
                .collect();
            let chosen = select_neighbours(
                config.neighbour_policy(),
                config.m0(),
                candidates,
                |a, b| store.distance(a, b),
            );
            primary.replace_level0(
                node,
                chosen.into_iter().map(|n| n.id).collect(),
                config.m0(),
            )
        })
    })
}
