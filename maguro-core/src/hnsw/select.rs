//! Neighbour-selection policies used when pruning candidate edges to a cap.

use crate::{config::NeighbourPolicy, hnsw::types::Neighbour};

/// Prunes `pool` down to at most `cap` neighbours under `policy`.
///
/// `between` computes the distance between two stored vectors; it is only
/// consulted by the heuristic policies. Candidates are considered in
/// ascending distance order (ties broken by id) and the result comes back
/// sorted the same way.
pub(crate) fn select_neighbours(
    policy: NeighbourPolicy,
    cap: usize,
    mut pool: Vec<Neighbour>,
    between: impl Fn(usize, usize) -> f32,
) -> Vec<Neighbour> {
    pool.sort_unstable();
    if pool.len() <= cap {
        return pool;
    }
    match policy {
        NeighbourPolicy::Naive => {
            pool.truncate(cap);
            pool
        }
        NeighbourPolicy::Heuristic => heuristic(cap, pool, between, false),
        NeighbourPolicy::HeuristicSaveRemains => heuristic(cap, pool, between, true),
    }
}

/// Diversity selection from the original paper: a candidate survives only
/// when it is strictly closer to the query than to every neighbour already
/// kept, which prevents the list collapsing onto one tight cluster.
fn heuristic(
    cap: usize,
    pool: Vec<Neighbour>,
    between: impl Fn(usize, usize) -> f32,
    save_remains: bool,
) -> Vec<Neighbour> {
    let mut kept: Vec<Neighbour> = Vec::with_capacity(cap);
    let mut rejected: Vec<Neighbour> = Vec::new();

    for candidate in pool {
        if kept.len() >= cap {
            if !save_remains {
                break;
            }
            rejected.push(candidate);
            continue;
        }
        let diverse = kept
            .iter()
            .all(|existing| between(candidate.id, existing.id) > candidate.distance);
        if diverse {
            kept.push(candidate);
        } else if save_remains {
            rejected.push(candidate);
        }
    }

    if save_remains && kept.len() < cap {
        // Rejects were pushed in ascending pool order, so the closest fill in
        // first without another sort.
        let shortfall = cap - kept.len();
        kept.extend(rejected.into_iter().take(shortfall));
        kept.sort_unstable();
    }
    kept
}
