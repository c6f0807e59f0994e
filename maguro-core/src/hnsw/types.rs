//! Shared types for graph traversal: entry points and neighbour ordering.
//!
//! Distances are finite `f32` values; finiteness is enforced at ingestion and
//! query preparation, so ordering here can rely on `total_cmp` with id
//! tie-breaking for determinism.

use std::cmp::Ordering;

/// Entry point into the hierarchical graph used when searching.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct EntryPoint {
    pub(crate) node: usize,
    pub(crate) level: usize,
}

/// Neighbour discovered during a search, including its distance from the query.
///
/// # Examples
/// ```
/// use maguro_core::Neighbour;
///
/// let neighbour = Neighbour { id: 3, distance: 0.42 };
/// assert_eq!(neighbour.id, 3);
/// assert!(neighbour.distance < 1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Dense id of the neighbouring vector (its insertion index).
    pub id: usize,
    /// Distance between the query and [`Neighbour::id`] under the index
    /// metric; lower is closer for every metric, including dot product.
    pub distance: f32,
}

impl Eq for Neighbour {}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Wrapper reversing [`Neighbour`] ordering so a max-heap yields the closest
/// candidate first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ReverseNeighbour(pub(crate) Neighbour);

impl Eq for ReverseNeighbour {}

impl Ord for ReverseNeighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for ReverseNeighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn neighbour_ordering_breaks_ties_by_id() {
        let near = Neighbour {
            id: 7,
            distance: 0.5,
        };
        let tied = Neighbour {
            id: 2,
            distance: 0.5,
        };
        let far = Neighbour {
            id: 0,
            distance: 0.9,
        };
        assert!(tied < near, "equal distances must order by id");
        assert!(near < far);
    }

    #[test]
    fn reverse_neighbour_turns_binary_heap_into_min_heap() {
        let mut heap = BinaryHeap::new();
        for (id, distance) in [(0, 0.9), (1, 0.1), (2, 0.5)] {
            heap.push(ReverseNeighbour(Neighbour { id, distance }));
        }
        let first = heap.pop().expect("heap is non-empty");
        assert_eq!(first.0.id, 1, "closest candidate must pop first");
    }
}
