//! Single-node insertion into the hierarchical graph.
//!
//! Each insertion descends greedily from the entry point to the node's top
//! layer, then runs a beam search per layer to gather candidates, prunes them
//! with the configured policy, publishes the node, and finally adds reverse
//! edges. Attachment happens before any back-link so a node id visible in a
//! neighbour list always resolves; entry promotion happens last.

use crate::{
    config::HnswConfig,
    error::{IndexError, Result},
    hnsw::{
        graph::Graph,
        search::LayerSearcher,
        select::select_neighbours,
        types::Neighbour,
    },
    store::VectorStore,
};

#[derive(Debug)]
pub(crate) struct Inserter<'a> {
    graph: &'a Graph,
    store: &'a VectorStore,
    config: &'a HnswConfig,
}

impl<'a> Inserter<'a> {
    pub(crate) fn new(graph: &'a Graph, store: &'a VectorStore, config: &'a HnswConfig) -> Self {
        Self {
            graph,
            store,
            config,
        }
    }

    /// Inserts `node` with a pre-sampled top layer of `level`.
    pub(crate) fn insert(&self, node: usize, level: usize) -> Result<()> {
        let entry = self
            .graph
            .entry()?
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} inserted into an unseeded graph"),
            })?;

        let searcher = LayerSearcher::new(self.graph, |id: usize| self.store.distance(node, id));

        let mut current = entry.node;
        for layer in ((level + 1)..=entry.level).rev() {
            current = searcher.greedy_descent(current, layer)?;
        }

        let target = level.min(entry.level);
        let mut lists = vec![Vec::new(); level + 1];
        let mut links: Vec<(usize, Vec<usize>)> = Vec::with_capacity(target + 1);
        for layer in (0..=target).rev() {
            let candidates = searcher.search_layer(current, layer, self.config.ef_construction())?;
            if let Some(closest) = candidates.first() {
                current = closest.id;
            }
            let chosen = select_neighbours(
                self.config.neighbour_policy(),
                self.config.cap_for_level(layer),
                candidates,
                |a, b| self.store.distance(a, b),
            );
            let ids: Vec<usize> = chosen.into_iter().map(|n| n.id).collect();
            lists[layer].clone_from(&ids);
            links.push((layer, ids));
        }

        self.graph.attach(node, lists)?;

        for (layer, ids) in links {
            let cap = self.config.cap_for_level(layer);
            for neighbour in ids {
                self.graph
                    .link_back(neighbour, layer, node, cap, |candidates| {
                        Ok(self.reselect(neighbour, candidates, cap))
                    })?;
            }
        }

        self.graph.promote_entry(node, level)?;
        Ok(())
    }

    /// Re-prunes an overflowing neighbour list from the owner's perspective.
    fn reselect(&self, owner: usize, candidates: &[usize], cap: usize) -> Vec<usize> {
        let pool: Vec<Neighbour> = candidates
            .iter()
            .map(|&id| Neighbour {
                id,
                distance: self.store.distance(owner, id),
            })
            .collect();
        select_neighbours(self.config.neighbour_policy(), cap, pool, |a, b| {
            self.store.distance(a, b)
        })
        .into_iter()
        .map(|n| n.id)
        .collect()
    }
}
