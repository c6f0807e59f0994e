//! In-memory graph representation used during build and resident search.
//!
//! Nodes live in a pre-allocated slot array indexed by dense id. Each slot
//! guards its per-layer neighbour lists with its own `RwLock`, so concurrent
//! insertions into disjoint nodes never contend and the beam-search read path
//! holds a lock only long enough to copy one list. The entry point sits
//! behind a separate mutex and is promoted with compare-and-exchange
//! semantics: a new level wins only when strictly greater, so ties keep the
//! incumbent.

use std::sync::{Mutex, RwLock};

use crate::{
    error::{IndexError, Result},
    hnsw::{search::NeighbourSource, types::EntryPoint},
};

/// Per-node state: one neighbour list per layer `0..=top_level`.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    levels: Vec<Vec<usize>>,
}

impl Node {
    fn from_lists(levels: Vec<Vec<usize>>) -> Self {
        debug_assert!(!levels.is_empty(), "every node exists at layer 0");
        Self { levels }
    }

    pub(crate) fn top_level(&self) -> usize {
        self.levels.len() - 1
    }

    pub(crate) fn neighbours(&self, level: usize) -> Option<&[usize]> {
        self.levels.get(level).map(Vec::as_slice)
    }
}

#[derive(Debug)]
struct Slot {
    state: RwLock<Option<Node>>,
}

/// Multi-layer proximity graph with per-node locking.
#[derive(Debug)]
pub(crate) struct Graph {
    slots: Vec<Slot>,
    entry: Mutex<Option<EntryPoint>>,
}

impl Graph {
    /// Pre-allocates one slot per vector; ids map directly to slots.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            state: RwLock::new(None),
        });
        Self {
            slots,
            entry: Mutex::new(None),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the current entry point, if any node has been attached.
    pub(crate) fn entry(&self) -> Result<Option<EntryPoint>> {
        let guard = self.entry.lock().map_err(|_| IndexError::LockPoisoned {
            resource: "entry point",
        })?;
        Ok(*guard)
    }

    /// Attaches the first node and installs it as the entry point.
    pub(crate) fn seed(&self, node: usize, level: usize) -> Result<()> {
        self.attach(node, vec![Vec::new(); level + 1])?;
        let mut guard = self.entry.lock().map_err(|_| IndexError::LockPoisoned {
            resource: "entry point",
        })?;
        *guard = Some(EntryPoint { node, level });
        Ok(())
    }

    /// Publishes a node with its selected neighbour lists.
    ///
    /// Must happen before any back-link references the node, so every id
    /// visible in a neighbour list resolves to an attached slot.
    pub(crate) fn attach(&self, node: usize, lists: Vec<Vec<usize>>) -> Result<()> {
        let slot = self
            .slots
            .get(node)
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} is outside pre-allocated capacity"),
            })?;
        let mut state = slot.state.write().map_err(|_| IndexError::LockPoisoned {
            resource: "node neighbour lists",
        })?;
        if state.is_some() {
            return Err(IndexError::GraphInvariantViolation {
                message: format!("node {node} attached twice"),
            });
        }
        *state = Some(Node::from_lists(lists));
        Ok(())
    }

    /// Advances the entry point when `level` strictly exceeds the incumbent's.
    pub(crate) fn promote_entry(&self, node: usize, level: usize) -> Result<()> {
        let mut guard = self.entry.lock().map_err(|_| IndexError::LockPoisoned {
            resource: "entry point",
        })?;
        let current = guard.map_or(0, |entry| entry.level);
        if guard.is_none() || level > current {
            *guard = Some(EntryPoint { node, level });
        }
        Ok(())
    }

    /// Runs `f` against a node's state under its read lock.
    pub(crate) fn with_node<R>(&self, node: usize, f: impl FnOnce(&Node) -> R) -> Result<R> {
        let slot = self
            .slots
            .get(node)
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} is outside pre-allocated capacity"),
            })?;
        let state = slot.state.read().map_err(|_| IndexError::LockPoisoned {
            resource: "node neighbour lists",
        })?;
        let inner = state
            .as_ref()
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} referenced before attachment"),
            })?;
        Ok(f(inner))
    }

    pub(crate) fn node_level(&self, node: usize) -> Result<usize> {
        self.with_node(node, Node::top_level)
    }

    /// Adds a reverse edge `node -> back`, re-selecting the whole list through
    /// `reselect` when the layer cap would be exceeded.
    ///
    /// The exclusive lock is held across `reselect` so concurrent overflow
    /// repairs on the same node serialise; distance work for other nodes
    /// never takes this lock.
    pub(crate) fn link_back(
        &self,
        node: usize,
        level: usize,
        back: usize,
        cap: usize,
        reselect: impl FnOnce(&[usize]) -> Result<Vec<usize>>,
    ) -> Result<()> {
        let slot = self
            .slots
            .get(node)
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} is outside pre-allocated capacity"),
            })?;
        let mut state = slot.state.write().map_err(|_| IndexError::LockPoisoned {
            resource: "node neighbour lists",
        })?;
        let inner = state
            .as_mut()
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} back-linked before attachment"),
            })?;
        let list =
            inner
                .levels
                .get_mut(level)
                .ok_or_else(|| IndexError::GraphInvariantViolation {
                    message: format!("node {node} has no layer {level}"),
                })?;
        if list.contains(&back) {
            return Ok(());
        }
        list.push(back);
        if list.len() > cap {
            let pruned = reselect(list)?;
            if pruned.len() > cap {
                return Err(IndexError::GraphInvariantViolation {
                    message: format!(
                        "node {node} layer {level}: {} neighbours after pruning to cap {cap}",
                        pruned.len()
                    ),
                });
            }
            *list = pruned;
        }
        Ok(())
    }

    /// Replaces a node's layer-0 list, enforcing the cap; used by the
    /// post-merge pass.
    pub(crate) fn replace_level0(&self, node: usize, neighbours: Vec<usize>, cap: usize) -> Result<()> {
        if neighbours.len() > cap {
            return Err(IndexError::GraphInvariantViolation {
                message: format!(
                    "node {node} layer 0: merged list of {} exceeds cap {cap}",
                    neighbours.len()
                ),
            });
        }
        let slot = self
            .slots
            .get(node)
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} is outside pre-allocated capacity"),
            })?;
        let mut state = slot.state.write().map_err(|_| IndexError::LockPoisoned {
            resource: "node neighbour lists",
        })?;
        let inner = state
            .as_mut()
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} merged before attachment"),
            })?;
        let list = inner
            .levels
            .first_mut()
            .ok_or_else(|| IndexError::GraphInvariantViolation {
                message: format!("node {node} has no layer 0"),
            })?;
        *list = neighbours;
        Ok(())
    }
}

impl NeighbourSource for Graph {
    fn copy_neighbours(&self, node: usize, level: usize, out: &mut Vec<usize>) -> Result<()> {
        self.with_node(node, |inner| {
            out.clear();
            if let Some(list) = inner.neighbours(level) {
                out.extend_from_slice(list);
                Ok(())
            } else {
                Err(IndexError::GraphInvariantViolation {
                    message: format!("node {node} visited at absent layer {level}"),
                })
            }
        })?
    }
}
