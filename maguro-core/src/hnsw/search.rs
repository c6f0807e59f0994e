//! Greedy descent and best-first layer search.
//!
//! The traversal is generic over [`NeighbourSource`] so the same code serves
//! the in-memory build graph and the memory-mapped read path, and over a
//! distance closure so insertion (node-to-node) and querying
//! (query-to-node) share it too.

use std::collections::{BinaryHeap, HashSet};

use crate::{
    error::Result,
    hnsw::types::{Neighbour, ReverseNeighbour},
};

/// Read access to a node's neighbour list at one layer.
///
/// Implementations copy into the caller's buffer rather than returning a
/// borrow, so the resident graph can drop its per-node lock before any
/// distance work happens.
pub(crate) trait NeighbourSource {
    fn copy_neighbours(&self, node: usize, level: usize, out: &mut Vec<usize>) -> Result<()>;
}

#[derive(Debug)]
struct SearchState {
    visited: HashSet<usize>,
    candidates: BinaryHeap<ReverseNeighbour>,
    best: BinaryHeap<Neighbour>,
    best_ids: HashSet<usize>,
}

impl SearchState {
    fn new(entry: usize, distance: f32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(entry);

        let mut candidates = BinaryHeap::new();
        candidates.push(ReverseNeighbour(Neighbour {
            id: entry,
            distance,
        }));

        let mut best = BinaryHeap::new();
        best.push(Neighbour {
            id: entry,
            distance,
        });

        let mut best_ids = HashSet::new();
        best_ids.insert(entry);

        Self {
            visited,
            candidates,
            best,
            best_ids,
        }
    }

    fn pop_candidate(&mut self) -> Option<Neighbour> {
        self.candidates.pop().map(|reverse| reverse.0)
    }

    fn should_terminate(&self, ef: usize, candidate_distance: f32) -> bool {
        self.best.len() >= ef
            && self
                .best
                .peek()
                .is_some_and(|furthest| candidate_distance > furthest.distance)
    }

    fn visit(&mut self, candidate: usize) -> bool {
        self.visited.insert(candidate)
    }

    fn try_enqueue(&mut self, candidate: usize, distance: f32, ef: usize) {
        if self.best.len() >= ef
            && self
                .best
                .peek()
                .is_some_and(|furthest| distance > furthest.distance)
        {
            return;
        }

        if !self.best_ids.insert(candidate) {
            return;
        }

        self.candidates.push(ReverseNeighbour(Neighbour {
            id: candidate,
            distance,
        }));
        self.best.push(Neighbour {
            id: candidate,
            distance,
        });
        self.enforce_capacity(ef);
    }

    fn enforce_capacity(&mut self, ef: usize) {
        while self.best.len() > ef {
            if let Some(removed) = self.best.pop() {
                self.best_ids.remove(&removed.id);
            }
        }
    }

    fn finalise(self) -> Vec<Neighbour> {
        let mut neighbours = self.best.into_vec();
        neighbours.sort_unstable();
        neighbours
    }
}

#[derive(Debug)]
pub(crate) struct LayerSearcher<'a, S, F> {
    source: &'a S,
    dist: F,
}

impl<'a, S, F> LayerSearcher<'a, S, F>
where
    S: NeighbourSource,
    F: Fn(usize) -> f32,
{
    pub(crate) fn new(source: &'a S, dist: F) -> Self {
        Self { source, dist }
    }

    /// Width-1 descent: repeatedly steps to the closest neighbour until no
    /// neighbour improves on the current node.
    pub(crate) fn greedy_descent(&self, entry: usize, level: usize) -> Result<usize> {
        let mut current = entry;
        let mut current_dist = (self.dist)(current);
        let mut scratch = Vec::new();
        loop {
            self.source.copy_neighbours(current, level, &mut scratch)?;
            let closest = scratch
                .iter()
                .map(|&id| (id, (self.dist)(id)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match closest {
                Some((id, dist)) if dist < current_dist => {
                    current = id;
                    current_dist = dist;
                }
                _ => return Ok(current),
            }
        }
    }

    /// Best-first beam search keeping the `ef` closest nodes found, returned
    /// in ascending distance order.
    pub(crate) fn search_layer(
        &self,
        entry: usize,
        level: usize,
        ef: usize,
    ) -> Result<Vec<Neighbour>> {
        let mut state = SearchState::new(entry, (self.dist)(entry));
        let mut scratch = Vec::new();

        while let Some(candidate) = state.pop_candidate() {
            if state.should_terminate(ef, candidate.distance) {
                break;
            }

            self.source
                .copy_neighbours(candidate.id, level, &mut scratch)?;
            for id in scratch.drain(..) {
                if state.visit(id) {
                    state.try_enqueue(id, (self.dist)(id), ef);
                }
            }
        }
        Ok(state.finalise())
    }
}
